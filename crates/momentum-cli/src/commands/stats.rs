use serde_json::json;

use momentum_core::storage::Database;

pub fn run(recent: Option<usize>) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let stats = db.stats()?;

    match recent {
        Some(limit) => {
            let challenges = db.recent_challenges(limit)?;
            let out = json!({ "stats": stats, "recent": challenges });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        None => println!("{}", serde_json::to_string_pretty(&stats)?),
    }
    Ok(())
}
