//! Database seeder for Praxis development and testing.
//!
//! Seeds a demo client with a short session history and an open debt so
//! the ledger endpoints have something to show locally.
//!
//! Usage: cargo run --bin seeder

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use uuid::Uuid;

use praxis_db::entities::{
    clients, payments, sea_orm_active_enums::{PaymentStatus, SessionKind}, sessions,
};

/// Demo client ID (consistent for all seeds)
const DEMO_CLIENT_ID: &str = "00000000-0000-0000-0000-000000000001";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set in environment");

    println!("Connecting to database...");
    let db = praxis_db::connect(&database_url)
        .await
        .expect("Failed to connect to database");

    println!("Seeding demo client...");
    seed_demo_client(&db).await;

    println!("Seeding sessions and an open charge...");
    seed_sessions(&db).await;

    println!("Seeding complete!");
}

fn demo_client_id() -> Uuid {
    Uuid::parse_str(DEMO_CLIENT_ID).unwrap()
}

/// Seeds a demo client for development.
async fn seed_demo_client(db: &DatabaseConnection) {
    if clients::Entity::find_by_id(demo_client_id())
        .one(db)
        .await
        .ok()
        .flatten()
        .is_some()
    {
        println!("  Demo client already exists, skipping...");
        return;
    }

    let now = Utc::now().into();
    let client = clients::ActiveModel {
        id: Set(demo_client_id()),
        full_name: Set("Demo Client".to_string()),
        email: Set(Some("demo@praxis.dev".to_string())),
        phone: Set(Some("+972-50-000-0000".to_string())),
        credit_balance: Set(Decimal::ZERO),
        version: Set(1),
        created_at: Set(now),
        updated_at: Set(now),
    };
    client.insert(db).await.expect("Failed to seed demo client");
}

/// Seeds two past sessions, one of them with an open charge.
async fn seed_sessions(db: &DatabaseConnection) {
    let now = Utc::now();
    let session_specs = [
        // (weeks ago, price, charged)
        (3i64, Decimal::new(30000, 2), false),
        (1i64, Decimal::new(30000, 2), true),
    ];

    for (weeks_ago, price, charged) in session_specs {
        let start = now - Duration::weeks(weeks_ago);
        let session_id = Uuid::new_v4();

        let session = sessions::ActiveModel {
            id: Set(session_id),
            client_id: Set(demo_client_id()),
            start_time: Set(start.into()),
            end_time: Set((start + Duration::minutes(50)).into()),
            kind: Set(SessionKind::InPerson),
            price: Set(price),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };
        session.insert(db).await.expect("Failed to seed session");

        if charged {
            let payment = payments::ActiveModel {
                id: Set(Uuid::new_v4()),
                session_id: Set(session_id),
                client_id: Set(demo_client_id()),
                expected_amount: Set(price),
                status: Set(PaymentStatus::Pending),
                paid_at: Set(None),
                cancel_reason: Set(None),
                refunded_amount: Set(None),
                refund_reason: Set(None),
                refunded_at: Set(None),
                version: Set(1),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
            };
            payment.insert(db).await.expect("Failed to seed payment");
        }
    }
}
