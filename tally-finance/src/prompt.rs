//! Prompt text sent to the classification service.

use serde::Serialize;
use tally_core::Category;

/// What the service is asked to classify
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Query<'a> {
    pub description: &'a str,
    pub amount: f64,
}

pub fn system_prompt() -> String {
    let labels: Vec<&str> = Category::TAXONOMY.iter().map(Category::as_str).collect();
    format!(
        "You classify bank transactions using only Description and Amount.\n\
         \n\
         Pick exactly ONE category from this list:\n\
         {}\n\
         \n\
         Return ONLY valid JSON. No markdown. No extra text.\n\
         \n\
         Output format (must match exactly):\n\
         {{\"category\": \"Food\", \"confidence\": 0.85}}\n\
         \n\
         Notes:\n\
         - confidence must be a number from 0 to 1.\n\
         - If unclear, use \"Misc\" with lower confidence.\n\
         - If it looks like paying yourself or moving money between accounts, use \"Transfer\".\n\
         - If it looks like payroll or salary, use \"Income\".\n",
        labels.join(", ")
    )
}

pub fn user_prompt(query: &Query<'_>) -> String {
    serde_json::json!({
        "description": query.description,
        "amount": query.amount,
    })
    .to_string()
}
