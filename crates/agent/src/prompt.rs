use std::fmt::Write as _;

use fairquote_core::cpq::catalog::Catalog;
use fairquote_core::cpq::pricing::{DISCOUNT_PERCENT, DISCOUNT_THRESHOLD, MINIMUM_ORDER};
use fairquote_core::domain::order::OrderLine;

const REPLY_CONTRACT: &str = r#"Reply with exactly one JSON object and nothing else:
{"message": "<short answer for the salesperson>",
 "quote": null | {"lines": [{"product": "<collection label>", "carat": "<carat label>",
   "housing": "<optional>", "shape": "<optional>", "size": "<optional>",
   "colors": ["<color>", ...], "quantity": <pieces per color>}]},
 "options": ["<optional follow-up suggestion>", ...]}
Set "quote" to null unless you are proposing a complete replacement for the current order.
Never state prices in "quote"; pricing is computed by the order tool."#;

/// System instructions: the catalog, the business rules and the reply contract.
pub fn build_system_prompt(catalog: &Catalog) -> String {
    let mut prompt = String::from(
        "You are the order assistant at a jewelry trade fair. You help a salesperson \
         assemble wholesale orders from the catalog below.\n\nCATALOG\n",
    );

    for collection in catalog.collections() {
        let _ = writeln!(
            prompt,
            "- {} (minimum {} pcs per color)",
            collection.label, collection.minimum_per_color
        );

        let tiers: Vec<String> = collection
            .carats
            .iter()
            .zip(collection.prices.iter())
            .map(|(carat, price)| format!("{carat} €{price}"))
            .collect();
        let _ = writeln!(prompt, "  carats: {}", tiers.join(", "));

        let colors: Vec<&str> = catalog.colors_for(collection).iter().map(|c| c.name).collect();
        let _ = writeln!(prompt, "  colors: {}", colors.join(", "));

        if let Some(taxonomy) = collection.housing.and_then(|tag| catalog.housing_taxonomy(tag)) {
            let _ = writeln!(prompt, "  housings: {}", taxonomy.housings.join(", "));
            if !taxonomy.housing_types.is_empty() {
                let _ = writeln!(prompt, "  housing types: {}", taxonomy.housing_types.join(", "));
            }
            if !taxonomy.attachments.is_empty() {
                let _ = writeln!(prompt, "  attachments: {}", taxonomy.attachments.join(", "));
            }
        }
        if let Some(shapes) = collection.shapes {
            let _ = writeln!(prompt, "  shapes: {}", shapes.join(", "));
        }
        if let Some(sizes) = collection.sizes {
            let _ = writeln!(prompt, "  sizes: {}", sizes.join(", "));
        }
    }

    let _ = write!(
        prompt,
        "\nRULES\n- Orders from €{DISCOUNT_THRESHOLD} subtotal get {DISCOUNT_PERCENT}% off.\n\
         - The minimum order value is €{MINIMUM_ORDER}.\n\
         - Use catalog names exactly as written above.\n\n{REPLY_CONTRACT}"
    );

    prompt
}

/// User message for one turn, carrying the current order so the model can amend it.
pub fn render_user_turn(current_order: &[OrderLine], user_text: &str) -> String {
    if current_order.is_empty() {
        return user_text.to_string();
    }

    match serde_json::to_string(current_order) {
        Ok(order_json) => format!("Current order: {order_json}\n\n{user_text}"),
        Err(_) => user_text.to_string(),
    }
}
