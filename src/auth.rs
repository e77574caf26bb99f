//! Resolves TradingView session cookies from the environment or, on macOS,
//! Safari's binary cookie store. Never panics: any parse failure degrades
//! to an unauthenticated result.

use chrono::{DateTime, TimeZone, Utc};
use std::path::PathBuf;

/// Session credentials discovered for this process. `is_authenticated` is
/// true only when both values are present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthCookies {
  pub session_id: Option<String>,
  pub auth_token: Option<String>,
  pub expiry: Option<DateTime<Utc>>,
}

impl AuthCookies {
  pub fn is_authenticated(&self) -> bool {
    self.session_id.is_some() && self.auth_token.is_some()
  }
}

/// Environment, then (on macOS) Safari's cookie store, else unauthenticated.
pub fn discover_tv_cookies() -> AuthCookies {
  let env_sid = std::env::var("TV_SESSIONID").ok();
  let env_token = std::env::var("TV_AUTH_TOKEN").ok();
  if env_sid.is_some() || env_token.is_some() {
    return AuthCookies {
      session_id: env_sid,
      auth_token: env_token,
      expiry: None,
    };
  }

  if cfg!(target_os = "macos") {
    let cookies = get_safari_cookies();
    if cookies.session_id.is_some() || cookies.auth_token.is_some() {
      return cookies;
    }
  }

  AuthCookies::default()
}

fn safari_cookie_path() -> Option<PathBuf> {
  let home = dirs::home_dir()?;
  Some(home.join(
    "Library/Containers/com.apple.Safari/Data/Library/Cookies/Cookies.binarycookies",
  ))
}

pub fn get_safari_cookies() -> AuthCookies {
  let Some(path) = safari_cookie_path() else {
    return AuthCookies::default();
  };
  let Ok(bytes) = std::fs::read(&path) else {
    return AuthCookies::default();
  };
  parse_binarycookies(&bytes).unwrap_or_default()
}

/// Apple's Cocoa/Core Data epoch: 2001-01-01T00:00:00Z.
fn cocoa_epoch_to_utc(seconds: f64) -> Option<DateTime<Utc>> {
  let base = Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).single()?;
  base.checked_add_signed(chrono::Duration::milliseconds((seconds * 1000.0) as i64))
}

struct Cookie {
  domain: String,
  name: String,
  value: String,
  expiry: Option<DateTime<Utc>>,
}

/// Parse the `cook`-magic binarycookies page format: a page count, a page
/// size table, then one page per entry holding length-prefixed records.
/// Returns `None` on any structural inconsistency rather than panicking.
fn parse_binarycookies(bytes: &[u8]) -> Option<AuthCookies> {
  if bytes.len() < 8 || &bytes[0..4] != b"cook" {
    return None;
  }
  let page_count = u32::from_be_bytes(bytes[4..8].try_into().ok()?) as usize;

  let mut offset = 8usize;
  let mut page_sizes = Vec::with_capacity(page_count);
  for _ in 0..page_count {
    let size = u32::from_be_bytes(bytes.get(offset..offset + 4)?.try_into().ok()?);
    page_sizes.push(size as usize);
    offset += 4;
  }

  let mut cookies = Vec::new();
  for size in page_sizes {
    let page = bytes.get(offset..offset + size)?;
    cookies.extend(parse_page(page));
    offset += size;
  }

  let mut session_id = None;
  let mut auth_token = None;
  let mut expiry = None;
  for cookie in cookies {
    if !cookie.domain.contains(".tradingview.com") {
      continue;
    }
    match cookie.name.as_str() {
      "sessionid" => {
        session_id = Some(cookie.value);
        expiry = cookie.expiry;
      }
      "auth_token" => auth_token = Some(cookie.value),
      _ => {}
    }
  }

  Some(AuthCookies {
    session_id,
    auth_token,
    expiry,
  })
}

fn parse_page(page: &[u8]) -> Vec<Cookie> {
  let mut out = Vec::new();
  if page.len() < 8 {
    return out;
  }
  let record_count = u32::from_le_bytes(match page[4..8].try_into() {
    Ok(b) => b,
    Err(_) => return out,
  }) as usize;

  let mut record_offset = 8usize;
  for _ in 0..record_count {
    let Some(bytes) = page.get(record_offset..record_offset + 4) else {
      break;
    };
    let rec_start = u32::from_le_bytes(bytes.try_into().unwrap()) as usize;
    if let Some(record) = page.get(rec_start..) {
      if let Some(cookie) = parse_record(record) {
        out.push(cookie);
      }
    }
    record_offset += 4;
  }
  out
}

fn parse_record(record: &[u8]) -> Option<Cookie> {
  if record.len() < 56 {
    return None;
  }
  let expiry_secs = f64::from_le_bytes(record.get(8..16)?.try_into().ok()?);
  let domain_off = u32::from_le_bytes(record.get(36..40)?.try_into().ok()?) as usize;
  let name_off = u32::from_le_bytes(record.get(40..44)?.try_into().ok()?) as usize;
  let path_off = u32::from_le_bytes(record.get(44..48)?.try_into().ok()?) as usize;
  let value_off = u32::from_le_bytes(record.get(48..52)?.try_into().ok()?) as usize;
  let _ = path_off;

  let domain = read_cstr(record, domain_off)?;
  let name = read_cstr(record, name_off)?;
  let value = read_cstr(record, value_off)?;
  let expiry = cocoa_epoch_to_utc(expiry_secs);

  Some(Cookie {
    domain,
    name,
    value,
    expiry,
  })
}

fn read_cstr(record: &[u8], offset: usize) -> Option<String> {
  let bytes = record.get(offset..)?;
  let end = bytes.iter().position(|&b| b == 0)?;
  String::from_utf8(bytes[..end].to_vec()).ok()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn env_vars_take_priority() {
    std::env::set_var("TV_SESSIONID", "sid123");
    std::env::set_var("TV_AUTH_TOKEN", "tok456");
    let cookies = discover_tv_cookies();
    assert_eq!(cookies.session_id.as_deref(), Some("sid123"));
    assert_eq!(cookies.auth_token.as_deref(), Some("tok456"));
    assert!(cookies.is_authenticated());
    std::env::remove_var("TV_SESSIONID");
    std::env::remove_var("TV_AUTH_TOKEN");
  }

  #[test]
  fn malformed_store_degrades_to_none() {
    assert!(parse_binarycookies(b"not a cookie store").is_none());
    assert!(parse_binarycookies(b"cook").is_none());
  }

  #[test]
  fn cocoa_epoch_conversion_is_sane() {
    // 2001-01-02 00:00:00Z is 86400s past the Cocoa epoch.
    let dt = cocoa_epoch_to_utc(86400.0).unwrap();
    assert_eq!(dt, Utc.with_ymd_and_hms(2001, 1, 2, 0, 0, 0).unwrap());
  }
}
