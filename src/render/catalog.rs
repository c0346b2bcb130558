//! Catalog and watchlist listings.

use crate::types::StoreDocument;

/// `/list`: refresh time followed by one `[<id>] - <name> ` line per entry.
pub fn format_catalog(doc: &StoreDocument) -> String {
    let updated = match doc.last_updated {
        Some(ts) => ts.format("%a %b %d %Y %H:%M:%S UTC").to_string(),
        None => "never".to_string(),
    };

    let mut message = format!("Last updated: {updated} \n");
    for entry in &doc.catalog {
        message.push_str(&format!("{entry} \n"));
    }
    message
}

/// `/current`: one ticker per line, in insertion order.
pub fn format_watchlist(doc: &StoreDocument) -> String {
    doc.watchlist.iter().map(|coin| format!("{coin}\n")).collect()
}
