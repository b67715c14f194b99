//! Decode a Supabase JWT.

use anyhow::{anyhow, Result};
use colored::Colorize;
use serde_json::Value;

use supahack_core::credentials::{decode_project_ref_from_token, decode_token_payload, sanitize_api_key};

pub fn execute(token: &str) -> Result<()> {
    let (payload, project) = decode(token)?;

    println!("{}", serde_json::to_string_pretty(&payload)?);
    println!();
    match project {
        Some(reference) => println!("{} {}", "Project:".cyan(), reference.bold()),
        None => println!("{}", "○ No project reference in token".yellow()),
    }
    Ok(())
}

fn decode(token: &str) -> Result<(Value, Option<String>)> {
    let token = sanitize_api_key(token).ok_or_else(|| anyhow!("Token is empty"))?;
    let payload = decode_token_payload(&token).ok_or_else(|| anyhow!("Not a JWT with a JSON payload"))?;
    Ok((payload, decode_project_ref_from_token(&token)))
}
