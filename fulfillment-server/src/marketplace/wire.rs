//! Marketplace wire formats
//!
//! The order listing endpoint has been observed to wrap its records in three
//! different ways. Each shape is a variant of [`OrdersPayload`]; anything
//! else is rejected and yields no orders.
//!
//! The product search answers with origin products, each carrying the
//! channel products shown to buyers. Channel products are flattened into
//! [`CatalogProduct`] rows.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::models::OrderCreate;

/// Observed `data` shapes of the product-order listing
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OrdersPayload {
    /// `[{productOrder, order}, ...]`
    Records(Vec<OrderRecord>),
    /// `{contents: [{productOrderId, content: {productOrder, order}}]}`
    Contents { contents: Vec<ContentEntry> },
    /// `{content: [{productOrder, order}]}`
    Content { content: Vec<OrderRecord> },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentEntry {
    #[serde(default)]
    pub product_order_id: Option<Value>,
    pub content: OrderRecord,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    #[serde(default)]
    pub product_order: Option<ProductOrder>,
    #[serde(default)]
    pub order: Option<OrderInfo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductOrder {
    #[serde(default)]
    pub product_order_id: Option<Value>,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub quantity: Option<Value>,
    #[serde(default)]
    pub unit_price: Option<Value>,
    #[serde(default)]
    pub shipping_address: Option<ShippingAddress>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ShippingAddress {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tel1: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderInfo {
    #[serde(default)]
    pub orderer_name: Option<String>,
    #[serde(default)]
    pub orderer_tel: Option<String>,
    #[serde(default)]
    pub order_date: Option<String>,
    #[serde(default)]
    pub payment_date: Option<String>,
}

/// Extract orders from a listing response body
///
/// Fails closed: an unrecognised `data` shape produces an empty list.
pub fn parse_orders(body: &Value) -> Vec<OrderCreate> {
    let Some(data) = body.get("data") else {
        tracing::warn!("Order listing response has no data field");
        return Vec::new();
    };

    let payload = match OrdersPayload::deserialize(data) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, "Unrecognised order listing shape, ignoring response");
            return Vec::new();
        }
    };

    let records: Vec<(Option<Value>, OrderRecord)> = match payload {
        OrdersPayload::Records(records) | OrdersPayload::Content { content: records } => {
            records.into_iter().map(|r| (None, r)).collect()
        }
        OrdersPayload::Contents { contents } => contents
            .into_iter()
            .map(|entry| (entry.product_order_id, entry.content))
            .collect(),
    };

    records
        .into_iter()
        .filter_map(|(outer_id, record)| record.into_order(outer_id.as_ref()))
        .collect()
}

impl OrderRecord {
    /// Convert into an order row; records without a product-order id are skipped
    pub fn into_order(self, fallback_id: Option<&Value>) -> Option<OrderCreate> {
        let product_order = self.product_order.unwrap_or_default();
        let order = self.order.unwrap_or_default();

        let order_number = product_order
            .product_order_id
            .as_ref()
            .or(fallback_id)
            .and_then(value_to_string)?;

        let (customer_name, customer_phone) = recipient(&product_order, &order);

        Some(OrderCreate {
            order_number,
            product_name: product_order.product_name.unwrap_or_default().trim().to_string(),
            customer_name,
            customer_phone,
            quantity: product_order
                .quantity
                .as_ref()
                .and_then(value_to_i64)
                .unwrap_or(1),
            unit_price: product_order
                .unit_price
                .as_ref()
                .and_then(value_to_i64)
                .unwrap_or(0),
            ordered_at: order.order_date.or(order.payment_date),
        })
    }
}

/// Shipping recipient when both fields are present, orderer otherwise
fn recipient(product_order: &ProductOrder, order: &OrderInfo) -> (String, String) {
    if let Some(address) = &product_order.shipping_address {
        let name = address.name.as_deref().map(str::trim).unwrap_or_default();
        let tel = address.tel1.as_deref().map(str::trim).unwrap_or_default();
        if !name.is_empty() && !tel.is_empty() {
            return (name.to_string(), tel.to_string());
        }
    }
    (
        order.orderer_name.as_deref().unwrap_or_default().trim().to_string(),
        order.orderer_tel.as_deref().unwrap_or_default().trim().to_string(),
    )
}

fn value_to_string(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

fn value_to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Product search response body
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogResponse {
    #[serde(default)]
    pub contents: Vec<OriginProduct>,
    #[serde(default)]
    pub total_elements: Option<u64>,
    #[serde(default)]
    pub total_pages: Option<u32>,
    #[serde(default)]
    pub page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginProduct {
    #[serde(default)]
    pub origin_product_no: Option<Value>,
    #[serde(default)]
    pub channel_products: Vec<ChannelProduct>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProduct {
    #[serde(default)]
    pub channel_product_no: Option<Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status_type: Option<String>,
    #[serde(default)]
    pub whole_category_name: Option<String>,
    #[serde(default)]
    pub sale_price: Option<Value>,
    #[serde(default)]
    pub reg_date: Option<String>,
}

/// One sellable listing on the marketplace
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogProduct {
    pub product_id: String,
    /// Name buyers see; orders report this as their product name
    pub name: String,
    pub category: Option<String>,
    pub price: i64,
    pub status: Option<String>,
    pub registered_at: Option<String>,
    /// Local product an order for this listing resolves to
    pub registered_product_id: Option<i64>,
}

/// One page of the seller's catalog
#[derive(Debug, Clone, Default, Serialize)]
pub struct CatalogPage {
    pub products: Vec<CatalogProduct>,
    pub page: u32,
    pub total_pages: u32,
    pub total_elements: u64,
}

/// Flatten a product search response
///
/// Channel products without a name are skipped. A channel product without
/// its own number falls back to the origin product number.
pub fn parse_catalog(body: &Value, requested_page: u32) -> Result<CatalogPage, serde_json::Error> {
    let response = CatalogResponse::deserialize(body)?;

    let products: Vec<CatalogProduct> = response
        .contents
        .into_iter()
        .flat_map(|origin| {
            let origin_no = origin.origin_product_no;
            origin
                .channel_products
                .into_iter()
                .filter_map(move |channel| channel.into_catalog(origin_no.as_ref()))
        })
        .collect();

    Ok(CatalogPage {
        page: response.page.unwrap_or(requested_page),
        total_pages: response.total_pages.unwrap_or(1),
        total_elements: response.total_elements.unwrap_or(products.len() as u64),
        products,
    })
}

impl ChannelProduct {
    fn into_catalog(self, origin_no: Option<&Value>) -> Option<CatalogProduct> {
        let name = self.name.as_deref().map(str::trim).unwrap_or_default();
        if name.is_empty() {
            return None;
        }
        let product_id = self
            .channel_product_no
            .as_ref()
            .and_then(value_to_string)
            .or_else(|| origin_no.and_then(value_to_string))?;

        Some(CatalogProduct {
            product_id,
            name: name.to_string(),
            category: self.whole_category_name.filter(|c| !c.trim().is_empty()),
            price: self.sale_price.as_ref().and_then(value_to_i64).unwrap_or(0),
            status: self.status_type,
            registered_at: self.reg_date,
            registered_product_id: None,
        })
    }
}
