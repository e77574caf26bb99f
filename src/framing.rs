//! The `~m~<len>~m~<payload>` envelope TradingView wraps every message in.

/// Encode a single payload as one framed envelope. `len` is the payload's
/// UTF-8 byte length, not its character count.
pub fn encode(payload: &str) -> String {
  format!("~m~{}~m~{}", payload.len(), payload)
}

/// Split a buffer (possibly holding several coalesced envelopes, and
/// possibly ending mid-frame) into complete payloads plus whatever's left.
///
/// Pure function: feeding chunks of the same stream through repeated calls,
/// threading `remainder` back in as a prefix of the next call, yields the
/// same frame sequence regardless of how the input was chunked.
pub fn split(buffer: &str) -> (Vec<String>, String) {
  let mut frames = Vec::new();
  let mut rest = buffer;

  loop {
    let Some(after_tilde) = rest.strip_prefix("~m~") else {
      break;
    };
    let Some(len_end) = after_tilde.find("~m~") else {
      break;
    };
    let len_str = &after_tilde[..len_end];
    let Ok(declared_len) = len_str.parse::<usize>() else {
      break;
    };
    let body = &after_tilde[len_end + 3..];
    if body.len() < declared_len {
      break;
    }
    // `declared_len` comes straight off the wire; a malformed or adversarial
    // value can land mid-character. `get` (rather than direct indexing)
    // turns that into the same "leave it in the remainder" behavior as an
    // incomplete trailing frame instead of a panic.
    let (Some(frame), Some(tail)) = (body.get(..declared_len), body.get(declared_len..)) else {
      break;
    };
    frames.push(frame.to_string());
    rest = tail;
  }

  (frames, rest.to_string())
}

/// Is this payload a heartbeat frame (`~h~<n>`)?
pub fn is_heartbeat(payload: &str) -> bool {
  payload.starts_with("~h~")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn encode_then_split_is_identity() {
    let payload = r#"{"m":"set_auth_token","p":["abc"]}"#;
    let framed = encode(payload);
    let (frames, remainder) = split(&framed);
    assert_eq!(frames, vec![payload.to_string()]);
    assert!(remainder.is_empty());
  }

  #[test]
  fn split_handles_coalesced_frames() {
    let framed = format!("{}{}", encode("one"), encode("two"));
    let (frames, remainder) = split(&framed);
    assert_eq!(frames, vec!["one".to_string(), "two".to_string()]);
    assert!(remainder.is_empty());
  }

  #[test]
  fn split_keeps_partial_trailing_frame() {
    let full = encode("hello world");
    let cut = &full[..full.len() - 3];
    let (frames, remainder) = split(cut);
    assert!(frames.is_empty());
    assert_eq!(remainder, cut);
  }

  #[test]
  fn split_across_chunk_boundary_matches_whole_buffer() {
    let whole = format!("{}{}", encode("alpha"), encode("beta"));
    let (first_frames, carry) = split(&whole[..whole.len() - 5]);
    let (second_frames, remainder) =
      split(&format!("{}{}", carry, &whole[whole.len() - 5..]));
    let mut combined = first_frames;
    combined.extend(second_frames);
    assert_eq!(combined, vec!["alpha".to_string(), "beta".to_string()]);
    assert!(remainder.is_empty());
  }

  #[test]
  fn heartbeat_detection() {
    assert!(is_heartbeat("~h~42"));
    assert!(!is_heartbeat(r#"{"m":"du"}"#));
  }

  #[test]
  fn declared_length_off_a_char_boundary_does_not_panic() {
    // "café" is 5 bytes ('é' is 2 bytes); a declared length of 4 would slice
    // inside that character if taken at face value.
    let framed = "~m~4~m~café";
    let (frames, remainder) = split(framed);
    assert!(frames.is_empty());
    assert_eq!(remainder, framed);
  }
}
