//! Validation of inbound Order Records.
//!
//! [`validate`] is a pure function: no I/O, no shared state, safe to call from
//! any number of tasks. Checks run in a fixed order and stop at the first
//! failure:
//!
//! 1. Every required field is present (header, delivery, payment, every item)
//! 2. `dateCreated` is not after "now"
//! 3. `delivery.email` is a syntactically valid address
//! 4. Every item price is `>= 0`

use crate::order::OrderRecord;
use chrono::{DateTime, Utc};
use thiserror::Error;
use validator::{Validate, ValidateEmail};

/// Why a record was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// One or more required fields are absent or empty.
    #[error("missing required fields: {0}")]
    MissingFields(String),

    /// The order claims to be created after the validation time.
    #[error("order creation date {created} is in the future (now {now})")]
    CreatedInFuture {
        /// Claimed creation time.
        created: DateTime<Utc>,
        /// Validation time.
        now: DateTime<Utc>,
    },

    /// The delivery email does not parse.
    #[error("invalid delivery email: {0:?}")]
    InvalidEmail(String),

    /// An item has a negative price.
    #[error("item {index} has negative price {price}")]
    NegativePrice {
        /// Position of the item in the record.
        index: usize,
        /// The offending price.
        price: i64,
    },
}

/// Validate `record` against the current wall-clock time.
///
/// # Errors
///
/// Returns the first failing check as a [`ValidationError`].
pub fn validate(record: &OrderRecord) -> Result<(), ValidationError> {
    validate_at(record, Utc::now())
}

/// Validate `record` treating `now` as the current time.
///
/// # Errors
///
/// Returns the first failing check as a [`ValidationError`].
pub fn validate_at(record: &OrderRecord, now: DateTime<Utc>) -> Result<(), ValidationError> {
    record
        .validate()
        .map_err(|e| ValidationError::MissingFields(e.to_string()))?;

    let Some(created) = record.order.date_created else {
        return Err(ValidationError::MissingFields("order.dateCreated".to_string()));
    };
    if created > now {
        return Err(ValidationError::CreatedInFuture { created, now });
    }

    if !record.delivery.email.validate_email() {
        return Err(ValidationError::InvalidEmail(record.delivery.email.clone()));
    }

    if let Some((index, item)) = record.items.iter().enumerate().find(|(_, i)| i.price < 0) {
        return Err(ValidationError::NegativePrice {
            index,
            price: item.price,
        });
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use crate::order::{Delivery, Item, OrderHeader, Payment};
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn valid_record() -> OrderRecord {
        OrderRecord {
            order: OrderHeader {
                order_uid: "order-1".into(),
                track_number: "WBILMTESTTRACK".into(),
                entry: "WBIL".into(),
                locale: "en".into(),
                internal_signature: String::new(),
                customer_id: "test".into(),
                delivery_service: "meest".into(),
                shard_key: "9".into(),
                sm_id: 99,
                date_created: Some(now() - Duration::days(1)),
                oof_shard: "1".into(),
            },
            delivery: Delivery {
                name: "Test Testov".into(),
                phone: "+9720000000".into(),
                zip: "2639809".into(),
                city: "Kiryat Mozkin".into(),
                address: "Ploshad Mira 15".into(),
                region: "Kraiot".into(),
                email: "test@gmail.com".into(),
            },
            payment: Payment {
                transaction: "order-1".into(),
                request_id: String::new(),
                currency: "USD".into(),
                provider: "wbpay".into(),
                amount: 1817,
                payment_dt: 1_637_907_727,
                bank: "alpha".into(),
                delivery_cost: 1500,
                goods_total: 317,
                custom_fee: 0,
            },
            items: vec![Item {
                chrt_id: 9_934_930,
                track_number: "WBILMTESTTRACK".into(),
                price: 453,
                rid: "ab4219087a764ae0btest".into(),
                name: "Mascaras".into(),
                sale: 30,
                size: "0".into(),
                total_price: 317,
                nm_id: 2_389_212,
                brand: "Vivienne Sabo".into(),
                status: 202,
            }],
        }
    }

    #[test]
    fn accepts_complete_record() {
        assert_eq!(validate_at(&valid_record(), now()), Ok(()));
    }

    #[test]
    fn empty_internal_signature_and_request_id_are_allowed() {
        let record = valid_record();
        assert!(record.order.internal_signature.is_empty());
        assert!(record.payment.request_id.is_empty());
        assert!(validate_at(&record, now()).is_ok());
    }

    #[test]
    fn rejects_empty_record_as_missing_fields() {
        let err = validate_at(&OrderRecord::default(), now()).unwrap_err();
        assert!(matches!(err, ValidationError::MissingFields(_)));
    }

    #[test]
    fn rejects_missing_nested_item_field() {
        let mut record = valid_record();
        record.items[0].brand.clear();
        assert!(matches!(
            validate_at(&record, now()),
            Err(ValidationError::MissingFields(_))
        ));
    }

    #[test]
    fn rejects_record_without_items() {
        let mut record = valid_record();
        record.items.clear();
        assert!(matches!(
            validate_at(&record, now()),
            Err(ValidationError::MissingFields(_))
        ));
    }

    #[test]
    fn rejects_missing_creation_date() {
        let mut record = valid_record();
        record.order.date_created = None;
        assert!(matches!(
            validate_at(&record, now()),
            Err(ValidationError::MissingFields(_))
        ));
    }

    #[test]
    fn creation_exactly_now_is_accepted() {
        let mut record = valid_record();
        record.order.date_created = Some(now());
        assert!(validate_at(&record, now()).is_ok());
    }

    #[test]
    fn rejects_future_creation_date() {
        let mut record = valid_record();
        record.order.date_created = Some(now() + Duration::seconds(1));
        assert!(matches!(
            validate_at(&record, now()),
            Err(ValidationError::CreatedInFuture { .. })
        ));
    }

    #[test]
    fn rejects_bad_email() {
        let mut record = valid_record();
        record.delivery.email = "not-an-email".into();
        assert_eq!(
            validate_at(&record, now()),
            Err(ValidationError::InvalidEmail("not-an-email".into()))
        );
    }

    #[test]
    fn rejects_negative_price_with_index() {
        let mut record = valid_record();
        let mut second = record.items[0].clone();
        second.price = -100;
        record.items.push(second);

        assert_eq!(
            validate_at(&record, now()),
            Err(ValidationError::NegativePrice {
                index: 1,
                price: -100
            })
        );
    }

    #[test]
    fn structural_check_runs_before_semantic_checks() {
        let mut record = valid_record();
        record.delivery.city.clear();
        record.items[0].price = -1;
        record.order.date_created = Some(now() + Duration::days(1));

        assert!(matches!(
            validate_at(&record, now()),
            Err(ValidationError::MissingFields(_))
        ));
    }

    proptest! {
        #[test]
        fn negative_price_is_always_rejected(price in i64::MIN..0, position in 0usize..4) {
            let mut record = valid_record();
            let template = record.items[0].clone();
            record.items = vec![template; 4];
            record.items[position].price = price;

            prop_assert_eq!(
                validate_at(&record, now()),
                Err(ValidationError::NegativePrice { index: position, price })
            );
        }

        #[test]
        fn future_creation_is_always_rejected(ahead in 1i64..10_000_000) {
            let mut record = valid_record();
            record.order.date_created = Some(now() + Duration::seconds(ahead));

            let rejected = matches!(
                validate_at(&record, now()),
                Err(ValidationError::CreatedInFuture { .. })
            );
            prop_assert!(rejected);
        }

        #[test]
        fn email_without_at_sign_is_always_rejected(local in "[a-z0-9.]{1,20}") {
            let mut record = valid_record();
            record.delivery.email = local.clone();

            prop_assert_eq!(
                validate_at(&record, now()),
                Err(ValidationError::InvalidEmail(local))
            );
        }
    }
}
