use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    db::db::PgMarketTx,
    models::offermodel::{Appointment, AppointmentStatus},
};

#[async_trait]
pub trait AppointmentExt: Send {
    async fn get_appointment(
        &mut self,
        appointment_id: Uuid,
    ) -> Result<Option<Appointment>, sqlx::Error>;

    /// Most recent appointment between the requester and the property, in any status.
    async fn get_latest_appointment_for_requester(
        &mut self,
        property_id: Uuid,
        requester_id: Uuid,
    ) -> Result<Option<Appointment>, sqlx::Error>;

    async fn get_property_appointments(
        &mut self,
        property_id: Uuid,
    ) -> Result<Vec<Appointment>, sqlx::Error>;

    async fn insert_appointment(
        &mut self,
        property_id: Uuid,
        requester_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Appointment, sqlx::Error>;

    async fn set_appointment_status(
        &mut self,
        appointment_id: Uuid,
        status: AppointmentStatus,
        now: DateTime<Utc>,
    ) -> Result<Appointment, sqlx::Error>;

    /// Cancels every non-cancelled appointment on the property except `keep`.
    async fn cancel_open_appointments(
        &mut self,
        property_id: Uuid,
        keep: Option<Uuid>,
    ) -> Result<u64, sqlx::Error>;
}

#[async_trait]
impl AppointmentExt for PgMarketTx {
    async fn get_appointment(
        &mut self,
        appointment_id: Uuid,
    ) -> Result<Option<Appointment>, sqlx::Error> {
        sqlx::query_as::<_, Appointment>(
            r#"
            SELECT id, property_id, requester_id, status, created_at, updated_at
            FROM appointments
            WHERE id = $1
            "#
        )
        .bind(appointment_id)
        .fetch_optional(&mut *self.tx)
        .await
    }

    async fn get_latest_appointment_for_requester(
        &mut self,
        property_id: Uuid,
        requester_id: Uuid,
    ) -> Result<Option<Appointment>, sqlx::Error> {
        sqlx::query_as::<_, Appointment>(
            r#"
            SELECT id, property_id, requester_id, status, created_at, updated_at
            FROM appointments
            WHERE property_id = $1 AND requester_id = $2
            ORDER BY (status <> 'cancelled'::appointment_status) DESC, updated_at DESC
            LIMIT 1
            "#
        )
        .bind(property_id)
        .bind(requester_id)
        .fetch_optional(&mut *self.tx)
        .await
    }

    async fn get_property_appointments(
        &mut self,
        property_id: Uuid,
    ) -> Result<Vec<Appointment>, sqlx::Error> {
        sqlx::query_as::<_, Appointment>(
            r#"
            SELECT id, property_id, requester_id, status, created_at, updated_at
            FROM appointments
            WHERE property_id = $1
            ORDER BY created_at ASC
            "#
        )
        .bind(property_id)
        .fetch_all(&mut *self.tx)
        .await
    }

    async fn insert_appointment(
        &mut self,
        property_id: Uuid,
        requester_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Appointment, sqlx::Error> {
        sqlx::query_as::<_, Appointment>(
            r#"
            INSERT INTO appointments (property_id, requester_id, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING id, property_id, requester_id, status, created_at, updated_at
            "#
        )
        .bind(property_id)
        .bind(requester_id)
        .bind(AppointmentStatus::Pending)
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await
    }

    async fn set_appointment_status(
        &mut self,
        appointment_id: Uuid,
        status: AppointmentStatus,
        now: DateTime<Utc>,
    ) -> Result<Appointment, sqlx::Error> {
        sqlx::query_as::<_, Appointment>(
            r#"
            UPDATE appointments
            SET status = $2, updated_at = $3
            WHERE id = $1
            RETURNING id, property_id, requester_id, status, created_at, updated_at
            "#
        )
        .bind(appointment_id)
        .bind(status)
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await
    }

    async fn cancel_open_appointments(
        &mut self,
        property_id: Uuid,
        keep: Option<Uuid>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE appointments
            SET status = $2, updated_at = NOW()
            WHERE property_id = $1
            AND status <> $2
            AND ($3::uuid IS NULL OR id <> $3)
            "#
        )
        .bind(property_id)
        .bind(AppointmentStatus::Cancelled)
        .bind(keep)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }
}
