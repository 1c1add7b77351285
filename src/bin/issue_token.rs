// Mint a bearer token for the chat API, signed with JWT_SECRET.
use ai_chat::config::{jwt_secret_or_default, DEFAULT_JWT_SECRET};
use ai_chat::middleware::auth::issue_token;
use std::io::{self, Write};

fn prompt(label: &str) -> io::Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🎟️  AI Chat - Issue Token");
    println!("=========================");

    dotenvy::dotenv().ok();

    let secret = jwt_secret_or_default(std::env::var("JWT_SECRET").ok());
    if secret == DEFAULT_JWT_SECRET {
        eprintln!("⚠️  JWT_SECRET not set, signing with the default secret");
    }

    let user_id: i32 = match prompt("User id")?.parse() {
        Ok(id) => id,
        Err(_) => {
            eprintln!("❌ User id must be an integer");
            return Ok(());
        }
    };

    let username = prompt("Username")?;
    if username.is_empty() {
        eprintln!("❌ Username cannot be empty");
        return Ok(());
    }

    let hours: i64 = match prompt("Valid for hours [24]")?.as_str() {
        "" => 24,
        raw => raw.parse()?,
    };

    let token = issue_token(user_id, &username, &secret, chrono::Duration::hours(hours))?;

    println!();
    println!("✅ Token for '{}' (id {}), valid {}h:", username, user_id, hours);
    println!("{}", token);
    Ok(())
}
