//! Integration tests for the Order entity.
//!
//! These tests walk an order through its whole lifecycle together with the
//! customer and host that own it.

use chrono::Utc;
use domain::{
    Address, Country, Customer, DomainError, DomainEvent, Entity, EntityId, ErrorCode, Host,
    Money, NewItem, Order, OrderDraft, OrderEvent, OrderStatus,
};

fn customer() -> Customer {
    Customer::new(
        "buyer@example.com",
        Address::new(Country::new("GB").unwrap(), "221B Baker St", "London").with_postal_code("NW1"),
    )
}

fn host() -> Host {
    Host::new(
        "host@example.com",
        Address::new(Country::new("US").unwrap(), "1 Market St", "San Francisco"),
    )
}

async fn draft_for(customer: &Customer) -> Order {
    OrderDraft::new(
        customer.id,
        Country::new("US").unwrap(),
        customer.selected_address.clone(),
        vec![
            NewItem::new("Sneakers", "Nike", 900),
            NewItem::new("Jacket", "Patagonia", 1100),
        ],
    )
    .draft(|request| async move {
        // $5.00 base + $4.00 per started kilogram
        let kilos = request.total_weight_grams.div_ceil(1000) as u32;
        Money::from_cents(500).checked_add(Money::from_cents(400).checked_mul(kilos)?)
    })
    .await
    .unwrap()
}

mod order_lifecycle {
    use super::*;

    #[tokio::test]
    async fn complete_order_lifecycle() {
        let mut customer = customer();
        let mut host = host();

        let mut order = draft_for(&customer).await;
        customer.accept_order(&order);
        assert!(customer.owns_order(order.id()));
        assert_eq!(order.status(), OrderStatus::Drafted);
        assert_eq!(order.shipment_rate(), Money::from_cents(1300));
        assert_eq!(order.destination().country.as_str(), "GB");

        order.confirm(host.id, Utc::now()).unwrap();
        host.accept_order(&order);
        assert_eq!(host.order_ids, vec![order.id()]);

        let item_ids: Vec<EntityId> = order.items().iter().map(|item| item.id).collect();
        for item_id in &item_ids {
            order.receive_item(*item_id, Utc::now()).unwrap();
        }
        order
            .add_item_photos(item_ids[0], vec![EntityId::new()])
            .unwrap();

        let event = order
            .submit_shipment_info(Money::from_cents(4200), Some("TRACK-1".into()), Utc::now())
            .unwrap();
        let OrderEvent::ShipmentInfoSubmitted(data) = &event else {
            panic!("unexpected event {event:?}");
        };
        assert_eq!(data.host_id, host.id);
        assert_eq!(data.customer_id, customer.id);

        order.mark_paid(Utc::now()).unwrap();
        assert_eq!(order.status(), OrderStatus::Paid);
        assert!(order.status().is_terminal());
    }

    #[tokio::test]
    async fn accepting_an_order_twice_keeps_one_reference() {
        let mut customer = customer();
        let order = draft_for(&customer).await;

        customer.accept_order(&order);
        customer.accept_order(&order);

        assert_eq!(customer.order_ids.len(), 1);
    }

    #[tokio::test]
    async fn rejected_order_is_terminal() {
        let customer = customer();
        let mut order = draft_for(&customer).await;

        order.reject(Utc::now()).unwrap();

        let err: DomainError = order.confirm(EntityId::new(), Utc::now()).unwrap_err().into();
        assert_eq!(err.code, ErrorCode::Conflict);
        assert!(err.message.contains("Rejected"));
    }
}

mod records {
    use super::*;

    #[tokio::test]
    async fn entities_survive_record_round_trip() {
        let customer = customer();
        let order = draft_for(&customer).await;

        let restored = Customer::from_record(customer.to_record().unwrap()).unwrap();
        assert_eq!(restored, customer);

        let record = order.to_record().unwrap();
        assert_eq!(record["destination"]["country"], "GB");
        assert_eq!(Order::from_record(record).unwrap(), order);
    }

    #[tokio::test]
    async fn drafted_event_serializes_with_tag() {
        let customer = customer();
        let order = draft_for(&customer).await;
        let event = order.drafted_event();

        assert_eq!(event.event_type(), "order.drafted");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "OrderDrafted");
        assert_eq!(json["data"]["shipment_rate"]["cents"], 1300);

        let parsed: OrderEvent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, event);
    }
}
