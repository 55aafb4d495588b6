use crate::config::{OptMap, Subscription};
use anyhow::Result;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

// Everything outside the unreserved set (alphanumerics plus `-_.~`) is
// escaped, so the `|` separator and any `/`, `:`, `?`, `=` inside the joined
// subscription urls never survive encoding.
const STRICT: &AsciiSet = &NON_ALPHANUMERIC
  .remove(b'-')
  .remove(b'_')
  .remove(b'.')
  .remove(b'~');

// The ruleset reference keeps literal `/`.
const KEEP_SLASH: &AsciiSet = &NON_ALPHANUMERIC
  .remove(b'-')
  .remove(b'_')
  .remove(b'.')
  .remove(b'~')
  .remove(b'/');

// Always appended after the user options, in this exact order. User options
// with the same key are not deduplicated against these.
const FIXED_PARAMS: [(&str, &str); 8] = [
  ("insert", "false"),
  ("emoji", "true"),
  ("tfo", "false"),
  ("scv", "true"),
  ("fdn", "false"),
  ("expand", "true"),
  ("sort", "false"),
  ("new_name", "true"),
];

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Fixed pause between consecutive conversion requests. No backoff, no
/// jitter.
const ITEM_PAUSE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
  Network,
  HttpStatus,
  EmptyBody,
  Filesystem,
}

impl FailureKind {
  pub fn describe(&self) -> &'static str {
    match self {
      FailureKind::Network => "network error",
      FailureKind::HttpStatus => "http error",
      FailureKind::EmptyBody => "empty response",
      FailureKind::Filesystem => "filesystem error",
    }
  }
}

#[derive(Debug, Clone)]
pub struct ConvertFailure {
  pub kind: FailureKind,
  pub message: String,
}

/// Result of one conversion attempt. Failures are values, not errors: one bad
/// subscription must not abort the batch.
#[derive(Debug, Clone)]
pub struct ConvertOutcome {
  pub bytes: u64,
  pub error: Option<ConvertFailure>,
}

impl ConvertOutcome {
  fn success(bytes: u64) -> Self {
    Self { bytes, error: None }
  }

  fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
    Self {
      bytes: 0,
      error: Some(ConvertFailure {
        kind,
        message: message.into(),
      }),
    }
  }

  pub fn ok(&self) -> bool {
    self.error.is_none()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
  Disabled,
  NoSubUrls,
  NoDstPath,
}

impl SkipReason {
  pub fn describe(&self) -> &'static str {
    match self {
      SkipReason::Disabled => "disabled",
      SkipReason::NoSubUrls => "sub_urls is empty",
      SkipReason::NoDstPath => "dst_path is empty",
    }
  }
}

/// One entry in the batch event log, in processing order.
#[derive(Debug, Clone)]
pub enum BatchEvent {
  Skipped {
    index: usize,
    name: String,
    reason: SkipReason,
  },
  Converted {
    index: usize,
    name: String,
    dst_path: PathBuf,
    outcome: ConvertOutcome,
  },
}

#[derive(Debug, Default)]
pub struct BatchReport {
  /// Number of configured subscription entries, including skipped ones.
  pub total: usize,
  pub events: Vec<BatchEvent>,
}

impl BatchReport {
  /// Resolved destination path -> success flag, in processing order. Skipped
  /// entries have no result.
  pub fn results(&self) -> Vec<(&Path, bool)> {
    self
      .events
      .iter()
      .filter_map(|event| match event {
        BatchEvent::Converted { dst_path, outcome, .. } => Some((dst_path.as_path(), outcome.ok())),
        BatchEvent::Skipped { .. } => None,
      })
      .collect()
  }

  pub fn success_count(&self) -> usize {
    self.results().iter().filter(|(_, ok)| *ok).count()
  }
}

pub struct Converter {
  base_url: String,
  config_url: String,
  opts: OptMap,
  client: Client,
}

impl Converter {
  pub fn new(base_url: String, config_url: String, opts: OptMap) -> Result<Self> {
    let client = Client::builder()
      .user_agent(USER_AGENT)
      .timeout(REQUEST_TIMEOUT)
      .build()?;
    Ok(Self {
      base_url,
      config_url,
      opts,
      client,
    })
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  pub fn config_url(&self) -> &str {
    &self.config_url
  }

  pub fn opts(&self) -> &OptMap {
    &self.opts
  }

  /// Join subscription urls with `|` and escape the joined token as a whole.
  pub fn encode_subscription_urls(sub_urls: &[String]) -> String {
    utf8_percent_encode(&sub_urls.join("|"), STRICT).to_string()
  }

  /// Build the request URL for one subscription. Pure string construction; an
  /// empty `base_url` or `config_url` yields a malformed URL rather than an
  /// error here.
  pub fn build_conversion_url(
    &self,
    sub_urls: &[String],
    subscription_opts: Option<&OptMap>,
    append_opts: Option<&OptMap>,
  ) -> String {
    // Global opts, then append_opts, then the per-subscription opts on top.
    let mut final_opts = self.opts.clone();
    if let Some(extra) = append_opts {
      final_opts.overlay(extra);
    }
    if let Some(overrides) = subscription_opts {
      final_opts.overlay(overrides);
    }

    let mut url = format!(
      "{}?url={}&config={}",
      self.base_url,
      Self::encode_subscription_urls(sub_urls),
      utf8_percent_encode(&self.config_url, KEEP_SLASH),
    );
    for (key, value) in final_opts.iter() {
      url.push('&');
      url.push_str(key);
      url.push('=');
      url.push_str(&value.render());
    }
    for (key, value) in FIXED_PARAMS {
      url.push('&');
      url.push_str(key);
      url.push('=');
      url.push_str(value);
    }
    url
  }

  /// Fetch the converted configuration for one subscription and write it to
  /// `dst_path`. Every failure is captured in the outcome.
  pub async fn convert_subscription(
    &self,
    sub_urls: &[String],
    dst_path: &Path,
    subscription_opts: Option<&OptMap>,
    append_opts: Option<&OptMap>,
  ) -> ConvertOutcome {
    let url = self.build_conversion_url(sub_urls, subscription_opts, append_opts);
    info!(url = %truncate(&url, 100), "requesting conversion");

    let resp = match self.client.get(&url).send().await {
      Ok(r) => r,
      Err(e) => {
        warn!(error = %e, "conversion request failed");
        return ConvertOutcome::failure(FailureKind::Network, e.to_string());
      }
    };

    let status = resp.status();
    if !status.is_success() {
      warn!(status = status.as_u16(), "conversion service returned an error status");
      return ConvertOutcome::failure(FailureKind::HttpStatus, format!("http {}", status.as_u16()));
    }

    let body = match resp.bytes().await {
      Ok(b) => b,
      Err(e) => {
        warn!(error = %e, "failed to read conversion response");
        return ConvertOutcome::failure(FailureKind::Network, e.to_string());
      }
    };
    if body.is_empty() {
      warn!("conversion service returned an empty body");
      return ConvertOutcome::failure(FailureKind::EmptyBody, "empty response body");
    }

    if let Some(parent) = dst_path.parent() {
      if !parent.as_os_str().is_empty() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
          return ConvertOutcome::failure(
            FailureKind::Filesystem,
            format!("create {}: {e}", parent.display()),
          );
        }
      }
    }
    if let Err(e) = tokio::fs::write(dst_path, &body).await {
      return ConvertOutcome::failure(
        FailureKind::Filesystem,
        format!("write {}: {e}", dst_path.display()),
      );
    }

    info!(dst = %dst_path.display(), bytes = body.len(), "subscription converted");
    ConvertOutcome::success(body.len() as u64)
  }

  /// Convert all entries sequentially, in declaration order. Disabled or
  /// incomplete entries are skipped without a result; a failed entry never
  /// stops the ones after it.
  pub async fn batch_convert(&self, subscriptions: &[Subscription], out_dir: &Path) -> BatchReport {
    let mut report = BatchReport {
      total: subscriptions.len(),
      events: Vec::new(),
    };
    let mut processed = 0usize;

    for (index, sub) in subscriptions.iter().enumerate() {
      let name = sub.display_name().to_string();
      let reason = if !sub.enable {
        Some(SkipReason::Disabled)
      } else if sub.sub_urls.is_empty() {
        Some(SkipReason::NoSubUrls)
      } else if sub.dst_path.is_empty() {
        Some(SkipReason::NoDstPath)
      } else {
        None
      };
      if let Some(reason) = reason {
        info!(entry = index + 1, name = %name, reason = reason.describe(), "skipping subscription");
        report.events.push(BatchEvent::Skipped { index, name, reason });
        continue;
      }

      // Pause between consecutive processed entries, never before the first
      // or after the last.
      if processed > 0 {
        sleep(ITEM_PAUSE).await;
      }
      processed += 1;

      info!(entry = index + 1, total = subscriptions.len(), name = %name, "converting subscription");
      let dst_path = resolve_dst_path(&sub.dst_path, out_dir);
      let outcome = self
        .convert_subscription(&sub.sub_urls, &dst_path, sub.opts.as_ref(), sub.append_opts.as_ref())
        .await;
      report.events.push(BatchEvent::Converted {
        index,
        name,
        dst_path,
        outcome,
      });
    }

    report
  }
}

/// Relative destinations land under the output directory; absolute paths pass
/// through unchanged.
pub fn resolve_dst_path(dst_path: &str, out_dir: &Path) -> PathBuf {
  let path = Path::new(dst_path);
  if path.is_absolute() {
    path.to_path_buf()
  } else {
    out_dir.join(path)
  }
}

fn truncate(s: &str, max: usize) -> &str {
  match s.char_indices().nth(max) {
    Some((idx, _)) => &s[..idx],
    None => s,
  }
}
