//! The Order Record aggregate.
//!
//! An order is always handled as one unit: header, delivery, payment and line
//! items are decoded, validated, persisted and cached together. A record with
//! only some of its parts is never committed.
//!
//! # Wire Format
//!
//! Records travel as JSON with camelCase keys:
//!
//! ```json
//! {
//!   "order":    { "orderUID": "b563feb7b2b84b6test", "trackNumber": "WBILMTESTTRACK", ... },
//!   "delivery": { "name": "Test Testov", "email": "test@gmail.com", ... },
//!   "payment":  { "transaction": "b563feb7b2b84b6test", "amount": 1817, ... },
//!   "items":    [ { "chrtID": 9934930, "price": 453, ... } ]
//! }
//! ```
//!
//! The upstream Go producer writes the same document with its struct field
//! names (`Order`, `OrderUID`, `Shardkey`, `Items`, ...) and encodes unset
//! fields as `null`. Both spellings are accepted on decode; encoding always
//! uses the camelCase keys.
//!
//! Missing keys and `null` values decode to empty values. Absence is then
//! reported by [`validate`](crate::validation::validate) as a domain error
//! rather than by the decoder, so a structurally incomplete order is
//! distinguishable from a payload that is not JSON at all.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

/// The full order aggregate, keyed by [`OrderHeader::order_uid`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct OrderRecord {
    /// Order-level attributes.
    #[validate(nested)]
    #[serde(alias = "Order", deserialize_with = "nullable")]
    pub order: OrderHeader,

    /// Recipient contact and address (1:1 with the order).
    #[validate(nested)]
    #[serde(alias = "Delivery", deserialize_with = "nullable")]
    pub delivery: Delivery,

    /// Transaction attributes (1:1 with the order).
    #[validate(nested)]
    #[serde(alias = "Payment", deserialize_with = "nullable")]
    pub payment: Payment,

    /// Line items in submission order.
    #[validate(length(min = 1, message = "an order needs at least one item"), nested)]
    #[serde(alias = "Items", deserialize_with = "nullable")]
    pub items: Vec<Item>,
}

impl OrderRecord {
    /// The order identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.order.order_uid
    }

    /// Decode a record from a JSON payload.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when the payload is not a JSON object of
    /// the expected shape.
    pub fn from_json(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// Encode the record as JSON.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if serialization fails.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Order header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct OrderHeader {
    /// Globally unique order id (primary key, immutable).
    #[validate(length(min = 1))]
    #[serde(rename = "orderUID", alias = "OrderUID", deserialize_with = "nullable")]
    pub order_uid: String,

    /// Shipment tracking number.
    #[validate(length(min = 1))]
    #[serde(rename = "trackNumber", alias = "TrackNumber", deserialize_with = "nullable")]
    pub track_number: String,

    /// Entry point code.
    #[validate(length(min = 1))]
    #[serde(alias = "Entry", deserialize_with = "nullable")]
    pub entry: String,

    /// Customer locale.
    #[validate(length(min = 1))]
    #[serde(alias = "Locale", deserialize_with = "nullable")]
    pub locale: String,

    /// Internal signature, may be empty.
    #[serde(
        rename = "internalSignature",
        alias = "InternalSignature",
        deserialize_with = "nullable"
    )]
    pub internal_signature: String,

    /// Customer identifier.
    #[validate(length(min = 1))]
    #[serde(rename = "customerID", alias = "CustomerID", deserialize_with = "nullable")]
    pub customer_id: String,

    /// Delivery service name.
    #[validate(length(min = 1))]
    #[serde(rename = "deliveryService", alias = "DeliveryService", deserialize_with = "nullable")]
    pub delivery_service: String,

    /// Shard key.
    #[validate(length(min = 1))]
    #[serde(rename = "shardKey", alias = "Shardkey", deserialize_with = "nullable")]
    pub shard_key: String,

    /// Storage manager id.
    #[serde(rename = "smID", alias = "SmID", deserialize_with = "nullable")]
    pub sm_id: i64,

    /// Creation timestamp; must not be in the future at validation time.
    #[validate(required)]
    #[serde(rename = "dateCreated", alias = "DateCreated")]
    pub date_created: Option<DateTime<Utc>>,

    /// Out-of-shard marker.
    #[validate(length(min = 1))]
    #[serde(rename = "oofShard", alias = "OofShard", deserialize_with = "nullable")]
    pub oof_shard: String,
}

/// Delivery recipient.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Delivery {
    /// Recipient name.
    #[validate(length(min = 1))]
    #[serde(alias = "Name", deserialize_with = "nullable")]
    pub name: String,
    /// Contact phone.
    #[validate(length(min = 1))]
    #[serde(alias = "Phone", deserialize_with = "nullable")]
    pub phone: String,
    /// Postal code.
    #[validate(length(min = 1))]
    #[serde(alias = "Zip", deserialize_with = "nullable")]
    pub zip: String,
    /// City.
    #[validate(length(min = 1))]
    #[serde(alias = "City", deserialize_with = "nullable")]
    pub city: String,
    /// Street address.
    #[validate(length(min = 1))]
    #[serde(alias = "Address", deserialize_with = "nullable")]
    pub address: String,
    /// Region.
    #[validate(length(min = 1))]
    #[serde(alias = "Region", deserialize_with = "nullable")]
    pub region: String,
    /// Contact email. Syntax is checked separately from presence.
    #[validate(length(min = 1))]
    #[serde(alias = "Email", deserialize_with = "nullable")]
    pub email: String,
}

/// Payment transaction. Monetary amounts are in minor units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Payment {
    /// Transaction id.
    #[validate(length(min = 1))]
    #[serde(alias = "Transaction", deserialize_with = "nullable")]
    pub transaction: String,
    /// Upstream request id, may be empty.
    #[serde(rename = "requestID", alias = "RequestID", deserialize_with = "nullable")]
    pub request_id: String,
    /// ISO currency code.
    #[validate(length(min = 1))]
    #[serde(alias = "Currency", deserialize_with = "nullable")]
    pub currency: String,
    /// Payment provider.
    #[validate(length(min = 1))]
    #[serde(alias = "Provider", deserialize_with = "nullable")]
    pub provider: String,
    /// Total amount.
    #[serde(alias = "Amount", deserialize_with = "nullable")]
    pub amount: i64,
    /// Payment time (unix seconds).
    #[serde(rename = "paymentDT", alias = "PaymentDT", deserialize_with = "nullable")]
    pub payment_dt: i64,
    /// Issuing bank.
    #[validate(length(min = 1))]
    #[serde(alias = "Bank", deserialize_with = "nullable")]
    pub bank: String,
    /// Delivery cost.
    #[serde(rename = "deliveryCost", alias = "DeliveryCost", deserialize_with = "nullable")]
    pub delivery_cost: i64,
    /// Goods total.
    #[serde(rename = "goodsTotal", alias = "GoodsTotal", deserialize_with = "nullable")]
    pub goods_total: i64,
    /// Customs fee.
    #[serde(rename = "customFee", alias = "CustomFee", deserialize_with = "nullable")]
    pub custom_fee: i64,
}

/// A single line item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Item {
    /// Chart id.
    #[serde(rename = "chrtID", alias = "ChrtID", deserialize_with = "nullable")]
    pub chrt_id: i64,
    /// Tracking number of the shipment carrying this item.
    #[validate(length(min = 1))]
    #[serde(rename = "trackNumber", alias = "TrackNumber", deserialize_with = "nullable")]
    pub track_number: String,
    /// Unit price; must be non-negative.
    #[serde(alias = "Price", deserialize_with = "nullable")]
    pub price: i64,
    /// Item rid.
    #[validate(length(min = 1))]
    #[serde(alias = "Rid", deserialize_with = "nullable")]
    pub rid: String,
    /// Product name.
    #[validate(length(min = 1))]
    #[serde(alias = "Name", deserialize_with = "nullable")]
    pub name: String,
    /// Sale percentage.
    #[serde(alias = "Sale", deserialize_with = "nullable")]
    pub sale: i64,
    /// Size label.
    #[validate(length(min = 1))]
    #[serde(alias = "Size", deserialize_with = "nullable")]
    pub size: String,
    /// Price after sale.
    #[serde(rename = "totalPrice", alias = "TotalPrice", deserialize_with = "nullable")]
    pub total_price: i64,
    /// Product id.
    #[serde(rename = "nmID", alias = "NmID", deserialize_with = "nullable")]
    pub nm_id: i64,
    /// Brand.
    #[validate(length(min = 1))]
    #[serde(alias = "Brand", deserialize_with = "nullable")]
    pub brand: String,
    /// Item status code.
    #[serde(alias = "Status", deserialize_with = "nullable")]
    pub status: i64,
}

/// Decode `null` as the field's default. Go encoders write nil pointers and
/// slices as `null`.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}
