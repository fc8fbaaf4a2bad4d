//! Domain types for the payments API.
//!
//! # Design
//! A representative slice of the remote schema, enough to exercise every
//! codec rule: required and optional fields, empty-as-absent collections,
//! timestamps, closed string vocabularies, a polymorphic payment source,
//! expandable references and list pages. Field names are the wire names.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::{Deserializer, Error as _};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codec::variant::{has_keys, with_tag};
use crate::codec::{decode_variant, empty_as_absent, Expandable, FormEncode, List, ListStyle, VariantShape};

pub type Metadata = BTreeMap<String, String>;

/// ISO currency codes accepted by the API, lower-case on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    Aud,
    Cad,
    Chf,
    Eur,
    Gbp,
    Hrk,
    Jpy,
    Usd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargeStatus {
    Succeeded,
    Pending,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankAccountStatus {
    New,
    Validated,
    Verified,
    VerificationFailed,
    Errored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardBrand {
    Visa,
    MasterCard,
    #[serde(rename = "American Express")]
    AmericanExpress,
    Discover,
    #[serde(rename = "Diners Club")]
    DinersClub,
    #[serde(rename = "JCB")]
    Jcb,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub brand: CardBrand,
    pub last4: String,
    pub exp_month: u32,
    pub exp_year: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_as_absent"
    )]
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankAccount {
    pub id: String,
    pub bank_name: String,
    pub country: String,
    pub currency: Currency,
    pub last4: String,
    pub routing_number: String,
    pub status: BankAccountStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_holder_name: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_as_absent"
    )]
    pub metadata: Option<Metadata>,
}

/// A generic source object (`object: "source"`), e.g. a redirect-based method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceObject {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<String>,
}

/// Where a charge's funds come from.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentSource {
    Card(Card),
    BankAccount(BankAccount),
    Source(SourceObject),
}

impl PaymentSource {
    /// Declared in dispatch order; structural signatures are only consulted
    /// when a payload has no `object` tag.
    const SHAPES: [VariantShape<PaymentSource>; 3] = [
        VariantShape {
            tag: "card",
            signature: |m| has_keys(m, &["brand", "exp_month", "last4"]),
            decode: |v| serde_json::from_value(v).map(PaymentSource::Card),
        },
        VariantShape {
            tag: "bank_account",
            signature: |m| has_keys(m, &["routing_number", "bank_name"]),
            decode: |v| serde_json::from_value(v).map(PaymentSource::BankAccount),
        },
        VariantShape {
            tag: "source",
            signature: is_source_shape,
            decode: |v| serde_json::from_value(v).map(PaymentSource::Source),
        },
    ];

    /// Wire discriminator of this shape.
    pub fn tag(&self) -> &'static str {
        match self {
            PaymentSource::Card(_) => "card",
            PaymentSource::BankAccount(_) => "bank_account",
            PaymentSource::Source(_) => "source",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            PaymentSource::Card(card) => &card.id,
            PaymentSource::BankAccount(account) => &account.id,
            PaymentSource::Source(source) => &source.id,
        }
    }

    pub fn from_wire(value: Value) -> Result<Self, crate::error::CodecError> {
        decode_variant("payment source", value, &Self::SHAPES)
    }
}

fn is_source_shape(map: &Map<String, Value>) -> bool {
    has_keys(map, &["type", "status", "flow"])
}

impl Serialize for PaymentSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::Error as _;

        let inner = match self {
            PaymentSource::Card(card) => serde_json::to_value(card),
            PaymentSource::BankAccount(account) => serde_json::to_value(account),
            PaymentSource::Source(source) => serde_json::to_value(source),
        }
        .map_err(S::Error::custom)?;
        with_tag(inner, self.tag()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PaymentSource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        PaymentSource::from_wire(value).map_err(D::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl Address {
    pub fn city(city: impl Into<String>) -> Self {
        Self {
            line1: None,
            line2: None,
            city: Some(city.into()),
            state: None,
            postal_code: None,
            country: None,
        }
    }
}

/// Date of birth of the account representative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dob {
    pub day: u32,
    pub month: u32,
    pub year: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegalEntity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<Dob>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created: DateTime<Utc>,
    pub livemode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<List<PaymentSource>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_as_absent"
    )]
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Charge {
    pub id: String,
    pub amount: i64,
    pub currency: Currency,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created: DateTime<Utc>,
    pub paid: bool,
    pub captured: bool,
    pub refunded: bool,
    pub status: ChargeStatus,
    pub livemode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PaymentSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<Expandable<Customer>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_email: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_as_absent"
    )]
    pub metadata: Option<Metadata>,
}

/// Confirmation returned by delete endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deleted {
    pub id: String,
    pub deleted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "charge.succeeded")]
    ChargeSucceeded,
    #[serde(rename = "charge.failed")]
    ChargeFailed,
    #[serde(rename = "charge.refunded")]
    ChargeRefunded,
    #[serde(rename = "customer.created")]
    CustomerCreated,
    #[serde(rename = "customer.updated")]
    CustomerUpdated,
    #[serde(rename = "customer.deleted")]
    CustomerDeleted,
    #[serde(rename = "customer.source.created")]
    CustomerSourceCreated,
    #[serde(rename = "account.updated")]
    AccountUpdated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    /// The object the event is about, in its wire form.
    pub object: Value,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_as_absent"
    )]
    pub previous_attributes: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EventType,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created: DateTime<Utc>,
    pub livemode: bool,
    pub pending_webhooks: u32,
    pub data: EventData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
}

/// Parameters for creating a charge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeCreate {
    pub amount: i64,
    pub currency: Currency,
    /// Token or source id to charge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expand: Vec<String>,
}

impl ChargeCreate {
    pub fn new(amount: i64, currency: Currency) -> Self {
        Self {
            amount,
            currency,
            source: None,
            customer: None,
            description: None,
            capture: None,
            receipt_email: None,
            metadata: None,
            expand: Vec::new(),
        }
    }
}

impl FormEncode for ChargeCreate {
    fn list_style(param: &str) -> ListStyle {
        expand_is_repeated(param)
    }
}

/// Parameters for updating a customer; only present fields change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expand: Vec<String>,
}

impl FormEncode for CustomerUpdate {
    fn list_style(param: &str) -> ListStyle {
        expand_is_repeated(param)
    }
}

/// Parameters for updating a connected account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal_entity: Option<LegalEntity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl FormEncode for AccountUpdate {}

/// Response shape of account updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal_entity: Option<LegalEntity>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_as_absent"
    )]
    pub metadata: Option<Metadata>,
}

/// Pagination parameters for list endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starting_after: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ending_before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,
}

impl FormEncode for ListParams {}

fn expand_is_repeated(param: &str) -> ListStyle {
    if param == "expand" {
        ListStyle::Repeated
    } else {
        ListStyle::Indexed
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::codec::{decode_from_wire, encode_form, encode_to_wire};
    use crate::error::CodecError;

    fn card_wire() -> Value {
        json!({
            "object": "card",
            "id": "card_19A5Nc2eZvKYlo2C",
            "brand": "Visa",
            "last4": "4242",
            "exp_month": 8,
            "exp_year": 2019,
            "name": null,
            "country": "US",
            "metadata": {}
        })
    }

    fn bank_wire() -> Value {
        json!({
            "object": "bank_account",
            "id": "ba_19A5Nd2eZvKYlo2C",
            "bank_name": "STRIPE TEST BANK",
            "country": "US",
            "currency": "usd",
            "last4": "6789",
            "routing_number": "110000000",
            "status": "new",
            "account_holder_name": "Jane Austen"
        })
    }

    fn source_wire() -> Value {
        json!({
            "object": "source",
            "id": "src_19A5Ne2eZvKYlo2C",
            "type": "sofort",
            "status": "pending",
            "flow": "redirect",
            "amount": 1099,
            "currency": "eur"
        })
    }

    fn charge_wire() -> Value {
        json!({
            "id": "ch_19A5Nf2eZvKYlo2C",
            "object": "charge",
            "amount": 2000,
            "currency": "usd",
            "created": 1475761243,
            "paid": true,
            "captured": true,
            "refunded": false,
            "status": "succeeded",
            "livemode": false,
            "source": card_wire(),
            "customer": null,
            "description": "Charge for order 6735",
            "failure_code": null,
            "failure_message": null,
            "metadata": {"order_id": "6735"}
        })
    }

    #[test]
    fn each_payment_source_shape_is_selected() {
        assert!(matches!(PaymentSource::from_wire(card_wire()).unwrap(), PaymentSource::Card(_)));
        assert!(matches!(
            PaymentSource::from_wire(bank_wire()).unwrap(),
            PaymentSource::BankAccount(_)
        ));
        assert!(matches!(
            PaymentSource::from_wire(source_wire()).unwrap(),
            PaymentSource::Source(_)
        ));
    }

    #[test]
    fn untagged_sources_dispatch_structurally() {
        for (wire, tag) in [(card_wire(), "card"), (bank_wire(), "bank_account"), (source_wire(), "source")] {
            let mut wire = wire;
            wire.as_object_mut().unwrap().remove("object");
            assert_eq!(PaymentSource::from_wire(wire).unwrap().tag(), tag);
        }
    }

    #[test]
    fn unknown_source_tag_fails_naming_it() {
        let wire = json!({"object": "bitcoin_receiver", "id": "btcrcv_1", "amount": 100});
        let err = PaymentSource::from_wire(wire.clone()).unwrap_err();
        assert!(matches!(&err, CodecError::UnknownVariant { tag: Some(t), .. } if t == "bitcoin_receiver"));

        // Nested inside a charge the whole decode fails with the tag in the message.
        let mut charge = charge_wire();
        charge["source"] = wire;
        let err = decode_from_wire::<Charge>(charge).unwrap_err();
        assert!(err.to_string().contains("bitcoin_receiver"), "{err}");
    }

    #[test]
    fn every_declared_shape_has_a_matching_tag() {
        let tags: Vec<&str> = PaymentSource::SHAPES.iter().map(|s| s.tag).collect();
        for wire in [card_wire(), bank_wire(), source_wire()] {
            let source = PaymentSource::from_wire(wire).unwrap();
            assert!(tags.contains(&source.tag()));
        }
    }

    #[test]
    fn charge_decodes_and_round_trips() {
        let charge: Charge = decode_from_wire(charge_wire()).unwrap();
        assert_eq!(charge.created, Utc.with_ymd_and_hms(2016, 10, 6, 13, 40, 43).unwrap());
        assert_eq!(charge.currency, Currency::Usd);
        assert_eq!(charge.customer, None);
        match &charge.source {
            Some(PaymentSource::Card(card)) => {
                assert_eq!(card.brand, CardBrand::Visa);
                assert_eq!(card.name, None);
                assert_eq!(card.metadata, None, "empty metadata is absent");
            }
            other => panic!("expected a card, got {other:?}"),
        }

        let again: Charge = decode_from_wire(encode_to_wire(&charge).unwrap()).unwrap();
        assert_eq!(again, charge);
        assert_eq!(encode_to_wire(&charge).unwrap()["created"], json!(1475761243));
    }

    #[test]
    fn charge_with_every_optional_absent_round_trips() {
        let charge = Charge {
            id: "ch_1".to_string(),
            amount: 100,
            currency: Currency::Eur,
            created: Utc.timestamp_opt(1_500_000_000, 0).unwrap(),
            paid: false,
            captured: false,
            refunded: false,
            status: ChargeStatus::Pending,
            livemode: false,
            source: None,
            customer: None,
            description: None,
            failure_code: None,
            failure_message: None,
            receipt_email: None,
            metadata: None,
        };
        let wire = encode_to_wire(&charge).unwrap();
        assert!(wire.get("metadata").is_none());
        assert_eq!(decode_from_wire::<Charge>(wire).unwrap(), charge);
    }

    #[test]
    fn charge_with_every_optional_present_round_trips() {
        let mut metadata = Metadata::new();
        metadata.insert("order_id".to_string(), "6735".to_string());
        let customer = Customer {
            id: "cus_1".to_string(),
            created: Utc.timestamp_opt(1_400_000_000, 0).unwrap(),
            livemode: false,
            email: Some("jenny@example.com".to_string()),
            description: Some("Jenny".to_string()),
            default_source: Some("src_1".to_string()),
            sources: Some(List::new(
                "/v1/customers/cus_1/sources",
                false,
                vec![PaymentSource::from_wire(source_wire()).unwrap()],
            )),
            metadata: Some(metadata.clone()),
        };
        let charge = Charge {
            id: "ch_2".to_string(),
            amount: 5000,
            currency: Currency::Hrk,
            created: Utc.timestamp_opt(1_500_000_000, 0).unwrap(),
            paid: false,
            captured: false,
            refunded: false,
            status: ChargeStatus::Failed,
            livemode: true,
            source: Some(PaymentSource::from_wire(bank_wire()).unwrap()),
            customer: Some(Expandable::Object(Box::new(customer))),
            description: Some("desc".to_string()),
            failure_code: Some("account_closed".to_string()),
            failure_message: Some("The bank account has been closed".to_string()),
            receipt_email: Some("jenny@example.com".to_string()),
            metadata: Some(metadata),
        };
        let decoded: Charge = decode_from_wire(encode_to_wire(&charge).unwrap()).unwrap();
        assert_eq!(decoded, charge);
    }

    #[test]
    fn unknown_currency_fails_instead_of_defaulting() {
        let mut wire = charge_wire();
        wire["currency"] = json!("xyz");
        assert!(decode_from_wire::<Charge>(wire).is_err());

        let mut wire = charge_wire();
        wire["currency"] = json!("USD");
        assert!(decode_from_wire::<Charge>(wire).is_err(), "vocabularies are case-sensitive");
    }

    #[test]
    fn missing_required_field_fails() {
        let mut wire = charge_wire();
        wire.as_object_mut().unwrap().remove("amount");
        assert!(decode_from_wire::<Charge>(wire).is_err());
    }

    #[test]
    fn event_type_decodes_dotted_names() {
        let event: Event = decode_from_wire(json!({
            "id": "evt_1",
            "object": "event",
            "type": "customer.source.created",
            "created": 1475761243,
            "livemode": false,
            "pending_webhooks": 1,
            "data": {"object": card_wire(), "previous_attributes": {}},
            "request": "req_1"
        }))
        .unwrap();
        assert_eq!(event.kind, EventType::CustomerSourceCreated);
        assert_eq!(event.data.previous_attributes, None);

        let err = decode_from_wire::<Event>(json!({
            "id": "evt_2",
            "type": "payout.paid",
            "created": 1,
            "livemode": false,
            "pending_webhooks": 0,
            "data": {"object": {}}
        }));
        assert!(err.is_err());
    }

    #[test]
    fn account_update_flattens_legal_entity_address() {
        let update = AccountUpdate {
            legal_entity: Some(LegalEntity {
                address: Some(Address::city("Zadar")),
                ..LegalEntity::default()
            }),
            ..AccountUpdate::default()
        };
        let params = encode_form(&update).unwrap();
        assert_eq!(params.get("legal_entity[address][city]"), Some("Zadar"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn account_update_flattens_dob() {
        let update = AccountUpdate {
            legal_entity: Some(LegalEntity {
                dob: Some(Dob { day: 6, month: 10, year: 1990 }),
                ..LegalEntity::default()
            }),
            ..AccountUpdate::default()
        };
        let params = encode_form(&update).unwrap();
        assert_eq!(params.get("legal_entity[dob][day]"), Some("6"));
        assert_eq!(params.get("legal_entity[dob][month]"), Some("10"));
        assert_eq!(params.get("legal_entity[dob][year]"), Some("1990"));
    }

    #[test]
    fn charge_create_form_uses_repeated_expand() {
        let mut params = ChargeCreate::new(2000, Currency::Usd);
        params.source = Some("tok_visa".to_string());
        params.expand = vec!["customer".to_string()];
        let form = encode_form(&params).unwrap();
        assert_eq!(form.get("amount"), Some("2000"));
        assert_eq!(form.get("currency"), Some("usd"));
        assert_eq!(form.get("source"), Some("tok_visa"));
        assert_eq!(form.get("expand[]"), Some("customer"));
        assert!(!form.contains_key("description"));
    }

    #[test]
    fn customer_sources_list_decodes_mixed_shapes() {
        let customer: Customer = decode_from_wire(json!({
            "id": "cus_1",
            "object": "customer",
            "created": 1475761243,
            "livemode": false,
            "email": null,
            "sources": {
                "object": "list",
                "url": "/v1/customers/cus_1/sources",
                "has_more": true,
                "data": [card_wire(), bank_wire()]
            },
            "metadata": {}
        }))
        .unwrap();
        let sources = customer.sources.unwrap();
        assert!(sources.has_more);
        let tags: Vec<&str> = sources.iter().map(PaymentSource::tag).collect();
        assert_eq!(tags, vec!["card", "bank_account"]);
        assert_eq!(customer.metadata, None);
    }

    fn round_trip<T>(value: &T) -> T
    where
        T: Serialize + serde::de::DeserializeOwned,
    {
        decode_from_wire(encode_to_wire(value).unwrap()).unwrap()
    }

    fn order_metadata() -> Metadata {
        Metadata::from([("order_id".to_string(), "6735".to_string())])
    }

    #[test]
    fn input_types_with_every_optional_absent_round_trip() {
        let charge = ChargeCreate::new(2000, Currency::Usd);
        let wire = encode_to_wire(&charge).unwrap();
        assert_eq!(wire, json!({"amount": 2000, "currency": "usd"}));
        assert_eq!(decode_from_wire::<ChargeCreate>(wire).unwrap(), charge);

        for wire in [encode_to_wire(&CustomerUpdate::default()).unwrap(), json!({})] {
            assert_eq!(decode_from_wire::<CustomerUpdate>(wire).unwrap(), CustomerUpdate::default());
        }
        assert_eq!(round_trip(&AccountUpdate::default()), AccountUpdate::default());
        assert_eq!(round_trip(&ListParams::default()), ListParams::default());
        assert_eq!(encode_to_wire(&ListParams::default()).unwrap(), json!({}));
    }

    #[test]
    fn input_types_with_every_optional_present_round_trip() {
        let charge = ChargeCreate {
            source: Some("tok_visa".to_string()),
            customer: Some("cus_1".to_string()),
            description: Some("Order 6735".to_string()),
            capture: Some(false),
            receipt_email: Some("jenny@example.com".to_string()),
            metadata: Some(order_metadata()),
            expand: vec!["customer".to_string(), "source".to_string()],
            ..ChargeCreate::new(2000, Currency::Eur)
        };
        assert_eq!(round_trip(&charge), charge);

        let customer = CustomerUpdate {
            email: Some("new@example.com".to_string()),
            description: Some("Jenny".to_string()),
            default_source: Some("card_1".to_string()),
            metadata: Some(order_metadata()),
            expand: vec!["default_source".to_string()],
        };
        assert_eq!(round_trip(&customer), customer);

        let account = AccountUpdate {
            email: Some("ops@example.com".to_string()),
            legal_entity: Some(LegalEntity {
                first_name: Some("Jenny".to_string()),
                last_name: Some("Rosen".to_string()),
                business_name: Some("Rosen Ltd".to_string()),
                address: Some(Address::city("Zadar")),
                dob: Some(Dob { day: 6, month: 10, year: 1990 }),
            }),
            metadata: Some(order_metadata()),
        };
        assert_eq!(round_trip(&account), account);

        let list = ListParams {
            limit: Some(10),
            starting_after: Some("ch_1".to_string()),
            ending_before: Some("ch_9".to_string()),
            customer: Some("cus_1".to_string()),
        };
        assert_eq!(round_trip(&list), list);
    }

    #[test]
    fn input_expand_tolerates_missing_and_null_optionals() {
        let decoded: ChargeCreate = decode_from_wire(json!({
            "amount": 100,
            "currency": "usd",
            "source": null
        }))
        .unwrap();
        assert_eq!(decoded, ChargeCreate::new(100, Currency::Usd));
        assert!(decoded.expand.is_empty());
    }

    #[test]
    fn account_round_trips_absent_and_present() {
        let bare = Account {
            id: "acct_1".to_string(),
            email: None,
            legal_entity: None,
            metadata: None,
        };
        assert_eq!(encode_to_wire(&bare).unwrap(), json!({"id": "acct_1"}));
        assert_eq!(round_trip(&bare), bare);

        let full = Account {
            email: Some("ops@example.com".to_string()),
            legal_entity: Some(LegalEntity {
                first_name: Some("Jenny".to_string()),
                address: Some(Address::city("Zadar")),
                dob: Some(Dob { day: 6, month: 10, year: 1990 }),
                ..LegalEntity::default()
            }),
            metadata: Some(order_metadata()),
            ..bare
        };
        assert_eq!(round_trip(&full), full);
    }

    #[test]
    fn customer_round_trips_absent_and_present() {
        let bare = Customer {
            id: "cus_1".to_string(),
            created: Utc.timestamp_opt(1_475_761_243, 0).unwrap(),
            livemode: false,
            email: None,
            description: None,
            default_source: None,
            sources: None,
            metadata: None,
        };
        assert_eq!(round_trip(&bare), bare);

        let full = Customer {
            email: Some("jenny@example.com".to_string()),
            description: Some("Jenny".to_string()),
            default_source: Some("card_19A5Nc2eZvKYlo2C".to_string()),
            sources: Some(List::new(
                "/v1/customers/cus_1/sources",
                true,
                vec![
                    PaymentSource::from_wire(card_wire()).unwrap(),
                    PaymentSource::from_wire(bank_wire()).unwrap(),
                ],
            )),
            metadata: Some(order_metadata()),
            ..bare
        };
        assert_eq!(round_trip(&full), full);
    }

    #[test]
    fn event_round_trips_absent_and_present() {
        let bare = Event {
            id: "evt_1".to_string(),
            kind: EventType::ChargeSucceeded,
            created: Utc.timestamp_opt(1_475_761_243, 0).unwrap(),
            livemode: false,
            pending_webhooks: 0,
            data: EventData {
                object: json!({"id": "ch_1", "object": "charge"}),
                previous_attributes: None,
            },
            request: None,
        };
        let wire = encode_to_wire(&bare).unwrap();
        assert_eq!(wire["type"], json!("charge.succeeded"));
        assert!(wire.get("request").is_none());
        assert_eq!(decode_from_wire::<Event>(wire).unwrap(), bare);

        let mut previous = Map::new();
        previous.insert("email".to_string(), json!("old@example.com"));
        let full = Event {
            kind: EventType::CustomerUpdated,
            livemode: true,
            pending_webhooks: 2,
            data: EventData {
                object: json!({"id": "cus_1", "email": "new@example.com"}),
                previous_attributes: Some(previous),
            },
            request: Some("req_1".to_string()),
            ..bare
        };
        assert_eq!(round_trip(&full), full);
    }

    #[test]
    fn deleted_round_trips() {
        let deleted = Deleted {
            id: "cus_1".to_string(),
            deleted: true,
        };
        assert_eq!(encode_to_wire(&deleted).unwrap(), json!({"id": "cus_1", "deleted": true}));
        assert_eq!(round_trip(&deleted), deleted);
        assert!(decode_from_wire::<Deleted>(json!({"id": "cus_1"})).is_err());
    }
}
