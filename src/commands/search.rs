use super::{block_on, fail};
use crate::services::rank_score;

pub fn run(query: String) {
    println!("🔍 Searching for '{}'\n", query.trim());

    let items = match block_on(|ctx| async move { ctx.client.search(&query).await }) {
        Ok(items) => items,
        Err(e) => fail("Search failed", e),
    };

    if items.is_empty() {
        println!("⚠️  No matches");
        return;
    }

    println!("{:>3}  {:<14} {:<28} {:<10} {:>6}", "#", "SYMBOL", "NAME", "CODE", "SCORE");
    for (i, c) in items.iter().enumerate() {
        println!(
            "{:>3}  {:<14} {:<28} {:<10} {:>6.1}",
            i + 1,
            c.symbol,
            c.label(),
            c.display_code(),
            rank_score(c)
        );
    }
    println!("\n💡 {} candidates, best match first", items.len());
}
