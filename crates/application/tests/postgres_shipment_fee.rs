//! Shipment-fee webhook races over PostgreSQL.
//!
//! Run with:
//!
//! ```bash
//! cargo test -p application --test postgres_shipment_fee
//! ```

use std::sync::Arc;

use application::{
    CreateOrder, CreateOrderRequest, CustomerRepository, DocumentCustomerRepository,
    DocumentHostRepository, DocumentOrderRepository, FinalizeOrder, FinalizeOrderRequest,
    HostRepository, InMemoryEventBus, InMemoryHostMatcher, InMemoryShipmentCostCalculator,
    OrderFilter, OrderRepository, PayOrderShipmentFee, PayOrderShipmentFeeRequest, ReceiveItem,
    ReceiveItemRequest, SubmitShipmentInfo, SubmitShipmentInfoRequest, WebhookOutcome,
};
use document_store::{DocumentStore, PostgresDocumentStore, with_transaction};
use domain::{Address, Country, Customer, ErrorCode, Host, Money, NewItem, OrderStatus};
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;

fn country(code: &str) -> Country {
    Country::new(code).unwrap()
}

#[tokio::test]
async fn overlapping_shipment_fee_deliveries_pay_once() {
    let container = Postgres::default().start().await.unwrap();
    let host_addr = container.get_host().await.unwrap();
    let port = container.get_host_port_ipv4(5432).await.unwrap();
    let url = format!("postgres://postgres:postgres@{host_addr}:{port}/postgres");
    let store = PostgresDocumentStore::connect(&url, 5).await.unwrap();
    store.run_migrations().await.unwrap();
    let store: Arc<dyn DocumentStore> = Arc::new(store);

    let customers = Arc::new(DocumentCustomerRepository::new());
    let hosts = Arc::new(DocumentHostRepository::new());
    let orders = Arc::new(DocumentOrderRepository::new());
    let events = Arc::new(InMemoryEventBus::new());
    let customer = Customer::new(
        "jane@example.com",
        Address::new(country("GB"), "1 High St", "London"),
    );
    let host = Host::new(
        "host@example.com",
        Address::new(country("US"), "5 Dock Rd", "Newark"),
    );
    let session = store.start_session().await.unwrap();
    customers
        .add_customer(session.as_ref(), &customer)
        .await
        .unwrap();
    hosts.add_host(session.as_ref(), &host).await.unwrap();
    session.commit().await.unwrap();

    let host_matcher = Arc::new(InMemoryHostMatcher::new());
    host_matcher.set_host(Some(host.clone()));
    let order = CreateOrder::new(
        store.clone(),
        customers.clone(),
        orders.clone(),
        host_matcher,
        Arc::new(InMemoryShipmentCostCalculator::new(Money::from_cents(1300))),
        events.clone(),
    )
    .execute(CreateOrderRequest {
        customer_id: customer.id,
        origin_country: country("US"),
        items: vec![NewItem::new("Boots", "Shoe Shop", 1200)],
    })
    .await
    .unwrap();
    FinalizeOrder::new(store.clone(), orders.clone(), hosts.clone(), events.clone())
        .execute(FinalizeOrderRequest {
            order_id: order.id(),
            host_id: host.id,
        })
        .await
        .unwrap();
    ReceiveItem::new(store.clone(), orders.clone(), events.clone())
        .execute(ReceiveItemRequest {
            host_id: host.id,
            order_id: order.id(),
            item_id: order.items()[0].id,
        })
        .await
        .unwrap();
    SubmitShipmentInfo::new(store.clone(), orders.clone(), events.clone())
        .execute(SubmitShipmentInfoRequest {
            host_id: host.id,
            order_id: order.id(),
            cost: Money::from_cents(4200),
            tracking_number: None,
        })
        .await
        .unwrap();
    events.clear();

    let first = PayOrderShipmentFee::new(store.clone(), orders.clone(), events.clone());
    let second = PayOrderShipmentFee::new(store.clone(), orders.clone(), events.clone());
    let request = PayOrderShipmentFeeRequest {
        order_id: order.id(),
    };
    let (a, b) = tokio::join!(
        tokio::spawn(async move { first.execute(request).await }),
        tokio::spawn(async move { second.execute(request).await }),
    );

    let outcomes = [a.unwrap(), b.unwrap()];
    let applied = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, Ok(WebhookOutcome::Applied)))
        .count();
    assert_eq!(applied, 1, "{outcomes:?}");
    // The loser either waited on the winner's row lock (CONFLICT) or read
    // the order after the commit (AlreadyApplied).
    for outcome in &outcomes {
        match outcome {
            Ok(_) => {}
            Err(err) => assert_eq!(err.code, ErrorCode::Conflict, "{err:?}"),
        }
    }
    assert_eq!(events.event_types(), vec!["order.paid"]);

    let stored = with_transaction(store.as_ref(), |session| async move {
        orders
            .find_order(session.as_ref(), OrderFilter::by_id(order.id()))
            .await
    })
    .await
    .unwrap();
    assert_eq!(stored.status(), OrderStatus::Paid);
}
