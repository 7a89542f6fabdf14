//! Orders and the `create_*_order` tool the seller agents call.

use crate::brain::tools::{Result, Tool, ToolExecutionContext, ToolResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub name: String,
    pub quantity: u32,
    /// Unit price in thousands of IDR, as printed on the menu.
    pub price: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub status: String,
    pub order_items: Vec<OrderItem>,
}

impl Order {
    pub fn new(order_items: Vec<OrderItem>) -> Self {
        Self {
            order_id: uuid::Uuid::new_v4().to_string(),
            status: "created".to_string(),
            order_items,
        }
    }
}

/// Sum of price times quantity; `None` when it does not fit in a `u64`.
fn order_total(items: &[OrderItem]) -> Option<u64> {
    items.iter().try_fold(0u64, |acc, i| {
        i.price
            .checked_mul(u64::from(i.quantity))
            .and_then(|line| acc.checked_add(line))
    })
}

/// Orders created by one seller process.
#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    orders: Arc<RwLock<Vec<Order>>>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, order_items: Vec<OrderItem>) -> Order {
        let order = Order::new(order_items);
        self.orders.write().await.push(order.clone());
        order
    }

    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[derive(Debug, Deserialize)]
struct CreateOrderInput {
    order_items: Vec<OrderItem>,
}

/// Records a confirmed order in the seller's order book.
pub struct CreateOrderTool {
    name: &'static str,
    description: String,
    book: OrderBook,
}

impl CreateOrderTool {
    /// `product` is the menu category, e.g. `burger`.
    pub fn new(name: &'static str, product: &str, book: OrderBook) -> Self {
        Self {
            name,
            description: format!(
                "Creates a new {} order with the given order items. \
                 Returns a message indicating that the order has been created.",
                product
            ),
            book,
        }
    }
}

#[async_trait]
impl Tool for CreateOrderTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "order_items": {
                    "type": "array",
                    "description": "List of order items to be added to the order.",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string"},
                            "quantity": {"type": "integer"},
                            "price": {"type": "integer"}
                        },
                        "required": ["name", "quantity", "price"]
                    }
                }
            },
            "required": ["order_items"]
        })
    }

    async fn execute(&self, input: Value, _context: &mut ToolExecutionContext) -> Result<ToolResult> {
        let input: CreateOrderInput = match serde_json::from_value(input) {
            Ok(input) => input,
            Err(e) => {
                tracing::warn!("Error creating order: {}", e);
                return Ok(ToolResult::error(format!("Error creating order: {}", e)));
            }
        };

        let Some(total) = order_total(&input.order_items) else {
            tracing::warn!("Error creating order: total is out of range");
            return Ok(ToolResult::error(
                "Error creating order: total is out of range",
            ));
        };

        let order = self.book.create(input.order_items).await;
        tracing::info!(
            order_id = %order.order_id,
            items = order.order_items.len(),
            total,
            "order created"
        );

        let rendered = serde_json::to_string(&order).unwrap_or_else(|_| order.order_id.clone());
        Ok(ToolResult::success(format!(
            "Order {} has been created",
            rendered
        )))
    }
}
