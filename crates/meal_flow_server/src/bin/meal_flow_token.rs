//! meal-flow-token: mint bearer tokens for local development.
//!
//! With no `--role`, prints one token for each of the three staff roles.

use chrono::Duration;
use clap::Parser;
use meal_flow_core::{CallerIdentity, Role};
use meal_flow_server::middleware::jwt::mint_token;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "meal-flow-token", about = "Mint development bearer tokens")]
struct Args {
    /// HMAC secret shared with the server
    #[arg(long, env = "MEAL_FLOW_JWT_SECRET", hide_env_values = true)]
    secret: String,

    /// Only mint for this role (manager, pantry, delivery)
    #[arg(long)]
    role: Option<Role>,

    /// Staff id to embed as `sub`; random when omitted
    #[arg(long)]
    user: Option<Uuid>,

    /// Token lifetime in hours
    #[arg(long, default_value_t = 24)]
    hours: i64,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let roles = match args.role {
        Some(role) => vec![role],
        None => Role::ALL.to_vec(),
    };
    for role in roles {
        let caller = CallerIdentity::new(args.user.unwrap_or_else(Uuid::new_v4), role);
        let token = mint_token(args.secret.as_bytes(), &caller, Duration::hours(args.hours))?;
        println!("{:<9} {}  {}", role.as_str(), caller.user_id, token);
    }
    Ok(())
}
