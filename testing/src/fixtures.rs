//! Ready-made Order Records.
//!
//! Every fixture passes validation at any time after its creation date.

use chrono::{DateTime, TimeZone, Utc};
use orderstream_core::{Delivery, Item, OrderHeader, OrderRecord, Payment};

/// Creation time used by [`sample_order`] (2021-11-26 06:22:19 UTC).
#[must_use]
pub fn sample_created_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 11, 26, 6, 22, 19)
        .single()
        .unwrap_or_default()
}

/// A complete, valid record with the given id.
#[must_use]
pub fn sample_order(id: &str) -> OrderRecord {
    sample_order_created_at(id, sample_created_at())
}

/// A complete, valid record with the given id and creation time.
#[must_use]
pub fn sample_order_created_at(id: &str, created: DateTime<Utc>) -> OrderRecord {
    OrderRecord {
        order: OrderHeader {
            order_uid: id.to_string(),
            track_number: "WBILMTESTTRACK".to_string(),
            entry: "WBIL".to_string(),
            locale: "en".to_string(),
            internal_signature: String::new(),
            customer_id: "test".to_string(),
            delivery_service: "meest".to_string(),
            shard_key: "9".to_string(),
            sm_id: 99,
            date_created: Some(created),
            oof_shard: "1".to_string(),
        },
        delivery: Delivery {
            name: "Test Testov".to_string(),
            phone: "+9720000000".to_string(),
            zip: "2639809".to_string(),
            city: "Kiryat Mozkin".to_string(),
            address: "Ploshad Mira 15".to_string(),
            region: "Kraiot".to_string(),
            email: "test@gmail.com".to_string(),
        },
        payment: Payment {
            transaction: id.to_string(),
            request_id: String::new(),
            currency: "USD".to_string(),
            provider: "wbpay".to_string(),
            amount: 1817,
            payment_dt: 1_637_907_727,
            bank: "alpha".to_string(),
            delivery_cost: 1500,
            goods_total: 317,
            custom_fee: 0,
        },
        items: vec![
            Item {
                chrt_id: 9_934_930,
                track_number: "WBILMTESTTRACK".to_string(),
                price: 453,
                rid: "ab4219087a764ae0btest".to_string(),
                name: "Mascaras".to_string(),
                sale: 30,
                size: "0".to_string(),
                total_price: 317,
                nm_id: 2_389_212,
                brand: "Vivienne Sabo".to_string(),
                status: 202,
            },
            Item {
                chrt_id: 9_934_931,
                track_number: "WBILMTESTTRACK".to_string(),
                price: 120,
                rid: "ab4219087a764ae0btest2".to_string(),
                name: "Lip Balm".to_string(),
                sale: 0,
                size: "0".to_string(),
                total_price: 120,
                nm_id: 2_389_213,
                brand: "Vivienne Sabo".to_string(),
                status: 202,
            },
        ],
    }
}
