use anyhow::Result;
use std::fmt::Write as _;
use std::path::Path;

use crate::config::{self, Subscription};

const TABLE_WIDTH: usize = 67;

pub fn run(config_path: &Path) -> Result<()> {
  let config = config::load_config(config_path)?;
  if config.subscriptions.is_empty() {
    println!("no subscriptions configured in {}", config_path.display());
    return Ok(());
  }

  println!("found {} subscriptions", config.subscriptions.len());
  print!("{}", render_table(&config.subscriptions));
  Ok(())
}

/// Fixed-width listing of every configured subscription, in declaration
/// order.
pub fn render_table(subscriptions: &[Subscription]) -> String {
  let mut out = String::new();
  let _ = writeln!(out, "{}", "=".repeat(TABLE_WIDTH));
  let _ = writeln!(
    out,
    "{:<20} {:<25} {:>9} {:>10}",
    "name", "dst_path", "url count", "enabled"
  );
  let _ = writeln!(out, "{}", "-".repeat(TABLE_WIDTH));
  for sub in subscriptions {
    let dst = if sub.dst_path.is_empty() {
      "(unset)"
    } else {
      sub.dst_path.as_str()
    };
    let _ = writeln!(
      out,
      "{:<20} {:<25} {:>9} {:>10}",
      sub.display_name(),
      dst,
      sub.sub_urls.len(),
      if sub.enable { "enabled" } else { "disabled" }
    );
  }
  let _ = writeln!(out, "{}", "=".repeat(TABLE_WIDTH));
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sub(name: &str, dst: &str, urls: usize, enable: bool) -> Subscription {
    Subscription {
      name: name.to_string(),
      sub_urls: (0..urls).map(|i| format!("https://example.com/{i}")).collect(),
      dst_path: dst.to_string(),
      enable,
      opts: None,
      append_opts: None,
    }
  }

  #[test]
  fn table_lists_every_entry_in_order() {
    let subs = vec![
      sub("main", "main.yaml", 2, true),
      sub("backup", "backup.yaml", 1, false),
    ];
    let rendered = render_table(&subs);
    let main_at = rendered.find("main ").unwrap();
    let backup_at = rendered.find("backup ").unwrap();
    assert!(main_at < backup_at);
    assert!(rendered.contains("disabled"));
  }

  #[test]
  fn unnamed_and_unset_fields_have_placeholders() {
    let subs = vec![sub("", "", 0, true)];
    let rendered = render_table(&subs);
    assert!(rendered.contains("(unnamed)"));
    assert!(rendered.contains("(unset)"));
  }
}
