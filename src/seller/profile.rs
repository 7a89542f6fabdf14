//! Static description of the two stores: identity, menu and prompts.

use crate::a2a::agent_card::CardIdentity;
use crate::a2a::types::AgentSkill;
use crate::config::{Config, SellerConfig};

pub const SUPPORTED_CONTENT_TYPES: &[&str] = &["text", "text/plain"];

pub const DEFAULT_SELLER_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SellerKind {
    Burger,
    Pizza,
}

pub struct MenuItem {
    pub name: &'static str,
    /// Thousands of IDR.
    pub price: u64,
}

const BURGER_MENU: &[MenuItem] = &[
    MenuItem { name: "Classic Cheeseburger", price: 85 },
    MenuItem { name: "Double Cheeseburger", price: 110 },
    MenuItem { name: "Spicy Chicken Burger", price: 80 },
    MenuItem { name: "Spicy Cajun Burger", price: 85 },
];

const PIZZA_MENU: &[MenuItem] = &[
    MenuItem { name: "Margherita Pizza", price: 100 },
    MenuItem { name: "Pepperoni Pizza", price: 140 },
    MenuItem { name: "Hawaiian Pizza", price: 110 },
    MenuItem { name: "Veggie Pizza", price: 100 },
    MenuItem { name: "BBQ Chicken Pizza", price: 130 },
];

/// Expected shape of the final answer, shared by both stores.
pub const RESPONSE_FORMAT_INSTRUCTION: &str = "\
Convert the assistant's last reply to the customer into a JSON object with 'status' and 'message' fields.
Keep the message exactly as the assistant phrased it.
Set response status to input_required if asking for user order confirmation.
Set response status to error if there is an error while processing the request.
Set response status to completed if the request is complete.";

impl SellerKind {
    /// Lower-case product noun, e.g. `burger`.
    pub fn product(self) -> &'static str {
        match self {
            SellerKind::Burger => "burger",
            SellerKind::Pizza => "pizza",
        }
    }

    pub fn agent_name(self) -> &'static str {
        match self {
            SellerKind::Burger => "burger_seller_agent",
            SellerKind::Pizza => "pizza_seller_agent",
        }
    }

    pub fn tool_name(self) -> &'static str {
        match self {
            SellerKind::Burger => "create_burger_order",
            SellerKind::Pizza => "create_pizza_order",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            SellerKind::Burger => 10001,
            SellerKind::Pizza => 10000,
        }
    }

    pub fn menu(self) -> &'static [MenuItem] {
        match self {
            SellerKind::Burger => BURGER_MENU,
            SellerKind::Pizza => PIZZA_MENU,
        }
    }

    /// The pizza store remembers earlier turns of a session; the burger
    /// store treats every task on its own.
    pub fn keeps_memory(self) -> bool {
        matches!(self, SellerKind::Pizza)
    }

    pub fn config(self, config: &Config) -> &SellerConfig {
        match self {
            SellerKind::Burger => &config.burger,
            SellerKind::Pizza => &config.pizza,
        }
    }

    pub fn identity(self) -> CardIdentity {
        let product = self.product();
        let (auth_scheme, example) = match self {
            SellerKind::Burger => ("Basic", "I want to order 2 classic cheeseburgers"),
            SellerKind::Pizza => ("Bearer", "I want to order 2 pepperoni pizzas"),
        };
        let description: &'static str = match self {
            SellerKind::Burger => "Helps with creating burger orders",
            SellerKind::Pizza => "Helps with creating pizza orders",
        };

        CardIdentity {
            name: self.agent_name(),
            description,
            auth_scheme,
            skill: AgentSkill {
                id: self.tool_name().to_string(),
                name: format!("{} Order Creation Tool", capitalize(product)),
                description: Some(description.to_string()),
                tags: Some(vec![format!("{} order creation", product)]),
                examples: Some(vec![example.to_string()]),
                input_modes: None,
                output_modes: None,
            },
            content_types: SUPPORTED_CONTENT_TYPES,
            push_notifications: true,
        }
    }

    /// System instruction for a turn. The burger prompt embeds the query and
    /// session id since that store keeps no history.
    pub fn instruction(self, query: &str, session_id: &str) -> String {
        let product = self.product();
        let tool = self.tool_name();
        let menu = self
            .menu()
            .iter()
            .map(|i| format!("- {}: IDR {}K", i.name, i.price))
            .collect::<Vec<_>>()
            .join("\n");

        let persona = match self {
            SellerKind::Burger => "\
You are the Burger Seller Agent, an expert and helpful burger seller agent.
Your goal is to help the user understand what is available on the burger menu and its prices, and to handle order creation.

",
            SellerKind::Pizza => "",
        };
        let received = match self {
            SellerKind::Burger => format!(
                "Received user query: {}\nSession ID: {}\n\n",
                query, session_id
            ),
            SellerKind::Pizza => String::new(),
        };

        format!(
            "{persona}# INSTRUCTIONS

You are a specialized assistant for a {product} store.
Your sole purpose is to answer questions about what is available on {product} menu and price also handle order creation.
If the user asks about anything other than {product} menu or order creation, politely state that you cannot help with that topic and can only assist with {product} menu and order creation.
Do not attempt to answer unrelated questions or use tools for other purposes.

# CONTEXT

{received}Provided below is the available {product} menu and it's related price:
{menu}

# RULES

- If user want to do something, you will be following this order:
    1. Always ensure the user already confirmed the order and total price. This confirmation may already given in the user query.
    2. Use `{tool}` tool to create the order
    3. Always provide the detailed ordered items, price breakdown and total, and order ID to the user after executing `{tool}` tool.

- Set response status to input_required if asking for user order confirmation.
- Set response status to error if there is an error while processing the request.
- Set response status to completed if the request is complete.
- DO NOT make up menu or price, Always rely on the provided menu given to you as context.
"
        )
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(SellerKind::Burger, "burger_seller_agent", "Basic", "Burger Order Creation Tool")]
    #[case(SellerKind::Pizza, "pizza_seller_agent", "Bearer", "Pizza Order Creation Tool")]
    fn test_identity(
        #[case] kind: SellerKind,
        #[case] name: &str,
        #[case] scheme: &str,
        #[case] skill_name: &str,
    ) {
        let identity = kind.identity();
        assert_eq!(identity.name, name);
        assert_eq!(identity.auth_scheme, scheme);
        assert_eq!(identity.skill.id, kind.tool_name());
        assert_eq!(identity.skill.name, skill_name);
        assert!(identity.push_notifications);
    }

    #[test]
    fn test_burger_instruction_embeds_query() {
        let text = SellerKind::Burger.instruction("2 classic cheeseburgers", "sess-9");
        assert!(text.contains("Received user query: 2 classic cheeseburgers"));
        assert!(text.contains("Session ID: sess-9"));
        assert!(text.contains("- Classic Cheeseburger: IDR 85K"));
        assert!(text.contains("`create_burger_order`"));
    }

    #[test]
    fn test_pizza_instruction_is_query_free() {
        let text = SellerKind::Pizza.instruction("pepperoni", "sess-1");
        assert!(!text.contains("Received user query"));
        assert!(!text.contains("sess-1"));
        assert!(text.contains("- BBQ Chicken Pizza: IDR 130K"));
        assert!(text.starts_with("# INSTRUCTIONS"));
    }
}
