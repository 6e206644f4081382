// service/notification_service.rs
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    db::db::DBClient,
    mail::{mails, sendmail::{send_email, MailSettings}},
    models::{dealmodel::Deal, propertymodel::Property},
};

/// Outbound notifications. Delivery is never part of a marketplace
/// transaction: callers dispatch after commit and ignore the result.
#[async_trait]
pub trait Notifier: Send + Sync + std::fmt::Debug {
    async fn deal_closed(&self, property: &Property, deal: &Deal) -> Result<(), String>;

    async fn bidding_lapsed(&self, property: &Property) -> Result<(), String>;
}

/// Where notification addresses come from.
#[async_trait]
pub trait UserDirectory: Send + Sync + std::fmt::Debug {
    async fn email_of(&self, user_id: Uuid) -> Result<Option<String>, String>;
}

#[async_trait]
impl UserDirectory for DBClient {
    async fn email_of(&self, user_id: Uuid) -> Result<Option<String>, String> {
        let emails = self
            .get_user_emails(&[user_id])
            .await
            .map_err(|e| e.to_string())?;
        Ok(emails.into_iter().next().map(|(_, email)| email))
    }
}

#[derive(Debug, Clone)]
pub struct NotificationService {
    users: Arc<dyn UserDirectory>,
    mail: MailSettings,
}

impl NotificationService {
    pub fn new(users: Arc<dyn UserDirectory>, mail: MailSettings) -> Self {
        Self { users, mail }
    }

    async fn mail_user(&self, user_id: Uuid, subject: &str, body: &str) -> Result<(), String> {
        let email = self
            .users
            .email_of(user_id)
            .await?
            .ok_or_else(|| format!("No email on record for user {}", user_id))?;
        send_email(&self.mail, &email, subject, body).await
    }
}

#[async_trait]
impl Notifier for NotificationService {
    /// Buyer and seller are mailed independently; one failing does not
    /// stop the other.
    async fn deal_closed(&self, property: &Property, deal: &Deal) -> Result<(), String> {
        tracing::info!(
            "Deal notification: property {} closed with buyer {} at {}",
            deal.property_id,
            deal.buyer_id,
            deal.final_price
        );

        let (subject, body) = mails::deal_closed_buyer(property, deal);
        let buyer = self.mail_user(deal.buyer_id, &subject, &body).await;
        if let Err(e) = &buyer {
            tracing::warn!("Buyer notification for deal {} failed: {}", deal.id, e);
        }

        let (subject, body) = mails::deal_closed_seller(property, deal);
        let seller = self.mail_user(deal.seller_id, &subject, &body).await;
        if let Err(e) = &seller {
            tracing::warn!("Seller notification for deal {} failed: {}", deal.id, e);
        }

        match (buyer, seller) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(_), Ok(())) => Err("buyer was not notified".to_string()),
            (Ok(()), Err(_)) => Err("seller was not notified".to_string()),
            (Err(_), Err(_)) => Err("neither party was notified".to_string()),
        }
    }

    async fn bidding_lapsed(&self, property: &Property) -> Result<(), String> {
        let (subject, body) = mails::bidding_lapsed(property);
        self.mail_user(property.owner_id, &subject, &body).await
    }
}

/// Fire-and-forget: failures are logged and otherwise dropped.
pub fn dispatch_deal_closed(notifier: Arc<dyn Notifier>, property: Property, deal: Deal) {
    tokio::spawn(async move {
        if let Err(e) = notifier.deal_closed(&property, &deal).await {
            tracing::warn!("Deal notification for property {} failed: {}", property.id, e);
        }
    });
}

pub fn dispatch_bidding_lapsed(notifier: Arc<dyn Notifier>, property: Property) {
    tokio::spawn(async move {
        if let Err(e) = notifier.bidding_lapsed(&property).await {
            tracing::warn!("Lapsed bidding notification for property {} failed: {}", property.id, e);
        }
    });
}
