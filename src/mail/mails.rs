use crate::models::{dealmodel::{Deal, DealType}, propertymodel::Property};

pub fn deal_closed_buyer(property: &Property, deal: &Deal) -> (String, String) {
    let verb = match deal.deal_type {
        DealType::Sale => "purchase",
        DealType::Rent => "rental",
    };
    let subject = format!("Your {} of {} is confirmed", verb, property.title);
    let body = format!(
        "<p>Congratulations! The owner has closed <strong>{}</strong> with you.</p>\
         <p>Final price: {}</p><p>Deal reference: {}</p>",
        property.title, deal.final_price, deal.id
    );
    (subject, body)
}

pub fn deal_closed_seller(property: &Property, deal: &Deal) -> (String, String) {
    let subject = format!("{} has been closed", property.title);
    let body = format!(
        "<p>Your listing <strong>{}</strong> is now closed.</p>\
         <p>Final price: {}</p><p>Deal reference: {}</p>",
        property.title, deal.final_price, deal.id
    );
    (subject, body)
}

pub fn bidding_lapsed(property: &Property) -> (String, String) {
    let subject = format!("Bidding on {} ended without bids", property.title);
    let body = format!(
        "<p>The bidding window for <strong>{}</strong> closed with no active bids.</p>\
         <p>Your listing is still available. You can reopen bidding from your dashboard.</p>",
        property.title
    );
    (subject, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::bidding_property;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn buyer_mail_mentions_price_and_reference() {
        let property = bidding_property(Uuid::new_v4(), Utc::now());
        let deal = Deal {
            id: Uuid::new_v4(),
            property_id: property.id,
            seller_id: property.owner_id,
            buyer_id: Uuid::new_v4(),
            final_price: 1100,
            deal_type: DealType::Sale,
            created_at: Utc::now(),
        };

        let (subject, body) = deal_closed_buyer(&property, &deal);
        assert!(subject.contains("purchase"));
        assert!(body.contains("1100"));
        assert!(body.contains(&deal.id.to_string()));
    }
}
