use anyhow::Result;
use std::fmt::Write as _;
use std::path::Path;

use crate::config::{self, Subscription};

pub fn run(config_path: &Path) -> Result<()> {
  let config = config::load_config(config_path)?;

  let Some(location) = config.settings.location.as_deref() else {
    println!("no `location` found under [settings] in {}", config_path.display());
    println!("add location = \"https://example.com/file/\" to [settings] to enable link listing");
    return Ok(());
  };

  if config.subscriptions.is_empty() {
    println!("no subscriptions configured in {}", config_path.display());
    return Ok(());
  }

  println!("location base: {location}");
  let (links, count) = render_links(location, &config.subscriptions);
  print!("{links}");
  println!("total: {count} enabled subscriptions");
  Ok(())
}

/// One shareable link per enabled subscription with a destination path.
/// Returns the rendered block and the number of links in it.
pub fn render_links(location: &str, subscriptions: &[Subscription]) -> (String, usize) {
  let mut out = String::new();
  let mut count = 0usize;
  for sub in subscriptions {
    if !sub.enable || sub.dst_path.is_empty() {
      continue;
    }
    let _ = writeln!(
      out,
      "{}: {}",
      sub.display_name(),
      location_link(location, &sub.dst_path)
    );
    count += 1;
  }
  (out, count)
}

/// Join the hosting base and a destination path with exactly one `/`.
fn location_link(base: &str, dst_path: &str) -> String {
  format!("{}/{}", base.trim_end_matches('/'), dst_path.trim_start_matches('/'))
}
