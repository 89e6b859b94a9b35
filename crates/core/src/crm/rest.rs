//! REST client for the CRM's JSON API.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::CrmConfig;
use crate::metrics::{CRM_CALLS, CRM_CALL_DURATION};

use super::{
    Contact, ContactId, ContactParams, Contribution, ContributionId, CrmClient, CrmError,
    DedupeQuery, DedupeRule, DedupeRuleRef, FinancialType, LineItem, OrderCreateParams, Payment,
    PaymentParams, PriceFieldValue, SubEntityParams,
};

/// Name of the price set every contribution falls back to.
const DEFAULT_PRICE_SET: &str = "default_contribution_amount";

/// Response envelope shared by every call.
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    #[serde(default)]
    is_error: i64,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    values: Value,
}

impl ApiEnvelope {
    /// Result rows, whether the API returned them as a list or keyed by id.
    fn rows(self) -> Vec<Value> {
        match self.values {
            Value::Array(rows) => rows,
            Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
            _ => Vec::new(),
        }
    }

    fn first_row(self) -> Option<Value> {
        self.rows().into_iter().next()
    }
}

/// CRM client speaking the `entity`/`action`/`json` REST protocol.
pub struct RestCrmClient {
    client: Client,
    config: CrmConfig,
}

impl RestCrmClient {
    /// Create a new client with the given configuration.
    pub fn new(config: CrmConfig) -> Result<Self, CrmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| CrmError::Configuration(e.to_string()))?;

        Ok(Self { client, config })
    }

    async fn call(&self, entity: &str, action: &str, params: Value) -> Result<ApiEnvelope, CrmError> {
        let operation = format!("{}.{}", entity, action);
        let start = Instant::now();

        let result = self.send(entity, action, &params).await;

        CRM_CALL_DURATION
            .with_label_values(&[&operation])
            .observe(start.elapsed().as_secs_f64());
        CRM_CALLS
            .with_label_values(&[&operation, if result.is_ok() { "success" } else { "error" }])
            .inc();

        result
    }

    async fn send(&self, entity: &str, action: &str, params: &Value) -> Result<ApiEnvelope, CrmError> {
        let json = params.to_string();
        debug!(entity = entity, action = action, "Calling CRM");

        let response = self
            .client
            .post(&self.config.url)
            .header("X-Civi-Auth", format!("Bearer {}", self.config.api_key))
            .header("X-Civi-Key", &self.config.site_key)
            .header("X-Requested-With", "XMLHttpRequest")
            .form(&[("entity", entity), ("action", action), ("json", json.as_str())])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CrmError::Timeout
                } else if e.is_connect() {
                    CrmError::ConnectionFailed(e.to_string())
                } else {
                    CrmError::InvalidResponse(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CrmError::Http {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let envelope: ApiEnvelope = response
            .json()
            .await
            .map_err(|e| CrmError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        if envelope.is_error != 0 {
            let message = envelope
                .error_message
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(CrmError::api(entity, action, message));
        }

        Ok(envelope)
    }
}

#[async_trait]
impl CrmClient for RestCrmClient {
    fn name(&self) -> &str {
        "rest"
    }

    async fn get_contact(&self, id: ContactId) -> Result<Option<Contact>, CrmError> {
        let envelope = self
            .call("Contact", "get", json!({ "id": id, "sequential": 1 }))
            .await?;
        envelope.first_row().map(|row| parse_contact(&row)).transpose()
    }

    async fn find_contact_for_user(&self, user_id: u64) -> Result<Option<ContactId>, CrmError> {
        let envelope = self
            .call(
                "UFMatch",
                "get",
                json!({ "uf_id": user_id, "sequential": 1, "return": ["contact_id"] }),
            )
            .await?;
        Ok(envelope
            .first_row()
            .and_then(|row| field_u64(&row, "contact_id")))
    }

    async fn find_duplicate_contacts(
        &self,
        query: &DedupeQuery,
    ) -> Result<Vec<ContactId>, CrmError> {
        let envelope = self
            .call("Contact", "duplicatecheck", dedupe_params(query))
            .await?;
        Ok(envelope
            .rows()
            .iter()
            .filter_map(|row| field_u64(row, "id"))
            .collect())
    }

    async fn create_contact(&self, params: &ContactParams) -> Result<Contact, CrmError> {
        let envelope = self
            .call("Contact", "create", contact_params(None, params))
            .await?;
        let row = envelope
            .first_row()
            .ok_or_else(|| CrmError::InvalidResponse("Contact.create returned no values".into()))?;
        parse_contact(&row)
    }

    async fn update_contact(
        &self,
        id: ContactId,
        params: &ContactParams,
    ) -> Result<Contact, CrmError> {
        let envelope = self
            .call("Contact", "create", contact_params(Some(id), params))
            .await?;
        let row = envelope
            .first_row()
            .ok_or_else(|| CrmError::InvalidResponse("Contact update returned no values".into()))?;
        parse_contact(&row)
    }

    async fn dedupe_rules(&self, contact_type: &str) -> Result<Vec<DedupeRule>, CrmError> {
        let envelope = self
            .call(
                "RuleGroup",
                "get",
                json!({
                    "contact_type": contact_type,
                    "sequential": 1,
                    "options": { "limit": 0 },
                }),
            )
            .await?;
        envelope.rows().iter().map(parse_dedupe_rule).collect()
    }

    async fn financial_types(&self) -> Result<Vec<FinancialType>, CrmError> {
        let envelope = self
            .call(
                "FinancialType",
                "get",
                json!({ "is_active": 1, "sequential": 1, "options": { "limit": 0 } }),
            )
            .await?;
        envelope.rows().iter().map(parse_financial_type).collect()
    }

    async fn price_field_value(&self, id: u64) -> Result<Option<PriceFieldValue>, CrmError> {
        let envelope = self
            .call("PriceFieldValue", "get", json!({ "id": id, "sequential": 1 }))
            .await?;
        envelope
            .first_row()
            .map(|row| parse_price_field_value(&row))
            .transpose()
    }

    async fn default_price_field_value(&self) -> Result<Option<PriceFieldValue>, CrmError> {
        let envelope = self
            .call(
                "PriceFieldValue",
                "get",
                json!({
                    "price_field_id.price_set_id.name": DEFAULT_PRICE_SET,
                    "sequential": 1,
                    "options": { "limit": 1 },
                }),
            )
            .await?;
        envelope
            .first_row()
            .map(|row| parse_price_field_value(&row))
            .transpose()
    }

    async fn create_order(&self, params: &OrderCreateParams) -> Result<Contribution, CrmError> {
        let envelope = self.call("Order", "create", order_params(params)).await?;
        let row = envelope
            .first_row()
            .ok_or_else(|| CrmError::InvalidResponse("Order.create returned no values".into()))?;
        parse_contribution(&row)
    }

    async fn create_payment(&self, params: &PaymentParams) -> Result<Payment, CrmError> {
        let envelope = self
            .call("Payment", "create", payment_params(params))
            .await?;
        let row = envelope
            .first_row()
            .ok_or_else(|| CrmError::InvalidResponse("Payment.create returned no values".into()))?;
        Ok(Payment {
            id: require_u64(&row, "id")?,
            contribution_id: field_u64(&row, "contribution_id").unwrap_or(params.contribution_id),
            total_amount: field_decimal(&row, "total_amount").unwrap_or(params.total_amount),
        })
    }

    async fn get_contribution(
        &self,
        id: ContributionId,
    ) -> Result<Option<Contribution>, CrmError> {
        let envelope = self
            .call("Contribution", "get", json!({ "id": id, "sequential": 1 }))
            .await?;
        envelope
            .first_row()
            .map(|row| parse_contribution(&row))
            .transpose()
    }

    async fn update_contribution(
        &self,
        contribution: &Contribution,
    ) -> Result<Contribution, CrmError> {
        let envelope = self
            .call("Contribution", "create", contribution_params(contribution))
            .await?;
        let row = envelope.first_row().ok_or_else(|| {
            CrmError::InvalidResponse("Contribution update returned no values".into())
        })?;
        parse_contribution(&row)
    }
}

// ============================================================================
// Outgoing parameters
// ============================================================================

/// Date format the API expects for date fields.
fn crm_date(date: &DateTime<Utc>) -> String {
    date.format("%Y%m%d%H%M%S").to_string()
}

fn money(amount: Decimal) -> String {
    amount.round_dp(2).to_string()
}

fn contact_params(id: Option<ContactId>, params: &ContactParams) -> Value {
    let mut map = Map::new();
    if let Some(id) = id {
        map.insert("id".into(), json!(id));
    }
    map.insert("contact_type".into(), json!(params.contact_type));
    if !params.contact_sub_type.is_empty() {
        map.insert("contact_sub_type".into(), json!(params.contact_sub_type));
    }
    if let Some(first_name) = &params.first_name {
        map.insert("first_name".into(), json!(first_name));
    }
    if let Some(last_name) = &params.last_name {
        map.insert("last_name".into(), json!(last_name));
    }
    if let Some(display_name) = &params.display_name {
        map.insert("display_name".into(), json!(display_name));
    }
    if let Some(source) = &params.source {
        map.insert("source".into(), json!(source));
    }
    map.insert("sequential".into(), json!(1));
    Value::Object(map)
}

fn dedupe_params(query: &DedupeQuery) -> Value {
    let mut params = json!({
        "match": {
            "contact_type": query.contact_type,
            "first_name": query.first_name,
            "last_name": query.last_name,
            "email": query.email,
        },
        "sequential": 1,
    });
    match query.rule {
        DedupeRuleRef::Unsupervised => params["rule_type"] = json!("Unsupervised"),
        DedupeRuleRef::Rule(id) => params["dedupe_rule_id"] = json!(id),
    }
    params
}

fn line_item_params(item: &LineItem) -> Value {
    let mut line = json!({
        "qty": money(item.qty),
        "unit_price": money(item.unit_price),
        "line_total": money(item.line_total),
        "tax_amount": money(item.tax_amount),
        "label": item.label,
    });
    if let Some(id) = item.price_field_id {
        line["price_field_id"] = json!(id);
    }
    if let Some(id) = item.price_field_value_id {
        line["price_field_value_id"] = json!(id);
    }
    if let Some(id) = item.financial_type_id {
        line["financial_type_id"] = json!(id);
    }

    let params = match &item.entity {
        Some(entity) => {
            line["entity_table"] = json!(entity.entity_table());
            sub_entity_params(entity)
        }
        None => json!([]),
    };

    json!({ "params": params, "line_item": [line] })
}

fn sub_entity_params(entity: &SubEntityParams) -> Value {
    match entity {
        SubEntityParams::Membership(membership) => {
            let mut params = json!({
                "contact_id": membership.contact_id,
                "membership_type_id": membership.membership_type_id,
                "status_id": membership.status,
                "skip_status_cal": 1,
            });
            if let Some(id) = membership.financial_type_id {
                params["financial_type_id"] = json!(id);
            }
            if let Some(source) = &membership.source {
                params["source"] = json!(source);
            }
            params
        }
        SubEntityParams::Participant(participant) => json!({
            "contact_id": participant.contact_id,
            "event_id": participant.event_id,
            "role_id": participant.role_id,
            "status_id": participant.status.id(),
            "source": participant.source,
            "fee_amount": money(participant.fee_amount),
            "fee_level": participant.fee_level,
            "register_date": crm_date(&participant.register_date),
        }),
    }
}

fn order_params(params: &OrderCreateParams) -> Value {
    let mut value = json!({
        "contact_id": params.contact_id,
        "financial_type_id": params.financial_type_id,
        "receive_date": crm_date(&params.receive_date),
        "trxn_id": params.trxn_id,
        "invoice_id": params.invoice_id,
        "contribution_status_id": params.contribution_status_id,
        "is_pay_later": if params.is_pay_later { 1 } else { 0 },
        "currency": params.currency,
        "line_items": params.line_items.iter().map(line_item_params).collect::<Vec<_>>(),
        "sequential": 1,
    });
    if let Some(source) = &params.source {
        value["source"] = json!(source);
    }
    if let Some(id) = params.campaign_id {
        value["campaign_id"] = json!(id);
    }
    if let Some(id) = params.payment_instrument_id {
        value["payment_instrument_id"] = json!(id);
    }
    value
}

fn payment_params(params: &PaymentParams) -> Value {
    let mut value = json!({
        "contribution_id": params.contribution_id,
        "total_amount": money(params.total_amount),
        "trxn_date": crm_date(&params.trxn_date),
        "trxn_id": params.trxn_id,
        "sequential": 1,
    });
    if let Some(id) = params.payment_instrument_id {
        value["payment_instrument_id"] = json!(id);
    }
    value
}

fn contribution_params(contribution: &Contribution) -> Value {
    let mut value = json!({
        "id": contribution.id,
        "contact_id": contribution.contact_id,
        "financial_type_id": contribution.financial_type_id,
        "contribution_status_id": contribution.contribution_status_id,
        "is_pay_later": if contribution.is_pay_later { 1 } else { 0 },
        "sequential": 1,
    });
    if let Some(date) = &contribution.receive_date {
        value["receive_date"] = json!(crm_date(date));
    }
    let optional_strings = [
        ("trxn_id", &contribution.trxn_id),
        ("invoice_id", &contribution.invoice_id),
        ("source", &contribution.source),
        ("currency", &contribution.currency),
    ];
    for (key, field) in optional_strings {
        if let Some(v) = field {
            value[key] = json!(v);
        }
    }
    if let Some(id) = contribution.campaign_id {
        value["campaign_id"] = json!(id);
    }
    let amounts = [
        ("total_amount", contribution.total_amount),
        ("fee_amount", contribution.fee_amount),
        ("net_amount", contribution.net_amount),
        ("non_deductible_amount", contribution.non_deductible_amount),
    ];
    for (key, amount) in amounts {
        if let Some(amount) = amount {
            value[key] = json!(money(amount));
        }
    }
    value
}

// ============================================================================
// Response parsing
// ============================================================================

// The API returns most numbers as strings, so every field is read leniently.

fn field_u64(row: &Value, key: &str) -> Option<u64> {
    match row.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn require_u64(row: &Value, key: &str) -> Result<u64, CrmError> {
    field_u64(row, key)
        .ok_or_else(|| CrmError::InvalidResponse(format!("missing or invalid '{}'", key)))
}

fn field_string(row: &Value, key: &str) -> String {
    match row.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn field_opt_string(row: &Value, key: &str) -> Option<String> {
    Some(field_string(row, key)).filter(|s| !s.is_empty())
}

fn field_decimal(row: &Value, key: &str) -> Option<Decimal> {
    match row.get(key)? {
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

fn field_bool(row: &Value, key: &str) -> bool {
    match row.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0) != 0,
        Some(Value::String(s)) => s == "1" || s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn field_date(row: &Value, key: &str) -> Option<DateTime<Utc>> {
    let raw = field_string(row, key);
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(&raw, "%Y%m%d%H%M%S"))
        .ok()
        .map(|dt| dt.and_utc())
}

/// Multi-valued fields come back as arrays or as a separator-delimited string.
fn field_list(row: &Value, key: &str) -> Vec<String> {
    match row.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => s
            .split('\u{1}')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn parse_contact(row: &Value) -> Result<Contact, CrmError> {
    Ok(Contact {
        id: require_u64(row, "id")?,
        contact_type: field_string(row, "contact_type"),
        contact_sub_type: field_list(row, "contact_sub_type"),
        first_name: field_string(row, "first_name"),
        last_name: field_string(row, "last_name"),
        display_name: field_string(row, "display_name"),
        source: field_opt_string(row, "source").or_else(|| field_opt_string(row, "contact_source")),
    })
}

fn parse_dedupe_rule(row: &Value) -> Result<DedupeRule, CrmError> {
    Ok(DedupeRule {
        id: require_u64(row, "id")?,
        name: field_string(row, "name"),
        title: field_string(row, "title"),
        contact_type: field_string(row, "contact_type"),
        used: field_string(row, "used"),
    })
}

fn parse_financial_type(row: &Value) -> Result<FinancialType, CrmError> {
    Ok(FinancialType {
        id: require_u64(row, "id")?,
        name: field_string(row, "name"),
        is_active: row.get("is_active").is_none() || field_bool(row, "is_active"),
    })
}

fn parse_price_field_value(row: &Value) -> Result<PriceFieldValue, CrmError> {
    Ok(PriceFieldValue {
        id: require_u64(row, "id")?,
        price_field_id: require_u64(row, "price_field_id")?,
        label: field_string(row, "label"),
        amount: field_decimal(row, "amount").unwrap_or_default(),
        financial_type_id: field_u64(row, "financial_type_id"),
    })
}

fn parse_contribution(row: &Value) -> Result<Contribution, CrmError> {
    Ok(Contribution {
        id: require_u64(row, "id")?,
        contact_id: require_u64(row, "contact_id")?,
        financial_type_id: require_u64(row, "financial_type_id")?,
        contribution_status_id: require_u64(row, "contribution_status_id")?,
        receive_date: field_date(row, "receive_date"),
        trxn_id: field_opt_string(row, "trxn_id"),
        invoice_id: field_opt_string(row, "invoice_id"),
        is_pay_later: field_bool(row, "is_pay_later"),
        source: field_opt_string(row, "contribution_source")
            .or_else(|| field_opt_string(row, "source")),
        campaign_id: field_u64(row, "campaign_id")
            .or_else(|| field_u64(row, "contribution_campaign_id")),
        currency: field_opt_string(row, "currency"),
        total_amount: field_decimal(row, "total_amount"),
        fee_amount: field_decimal(row, "fee_amount"),
        net_amount: field_decimal(row, "net_amount"),
        non_deductible_amount: field_decimal(row, "non_deductible_amount"),
    })
}
