/* src/server/core/src/injector.rs */

// Slot injection: replaces `<!--weft:key-->` comments in compiled
// component markup with preloaded data values.

const SLOT_OPEN: &str = "<!--weft:";
const SLOT_CLOSE: &str = "-->";

fn escape_html(input: &str) -> String {
  let mut out = String::with_capacity(input.len());
  for ch in input.chars() {
    match ch {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      _ => out.push(ch),
    }
  }
  out
}

fn slot_value(data: &serde_json::Value, key: &str) -> Option<String> {
  match data.get(key)? {
    serde_json::Value::String(s) => Some(escape_html(s)),
    serde_json::Value::Null => Some(String::new()),
    other => Some(escape_html(&other.to_string())),
  }
}

/// Flattens keyed results one level so slots can resolve from nested
/// objects: `{film: {title: "..."}}` exposes both `film` and `title`.
/// Top-level keys win on collision.
pub fn flatten_for_slots(data: &serde_json::Value) -> serde_json::Value {
  let Some(map) = data.as_object() else { return data.clone() };
  let mut flat = map.clone();
  for value in map.values() {
    if let serde_json::Value::Object(nested) = value {
      for (key, nested_value) in nested {
        flat.entry(key.clone()).or_insert_with(|| nested_value.clone());
      }
    }
  }
  serde_json::Value::Object(flat)
}

/// Replaces every `<!--weft:key-->` slot with the matching data value.
/// Unresolvable slots are left in place so missing data is visible in the
/// output rather than silently blanked.
pub fn inject(markup: &str, data: &serde_json::Value) -> String {
  let flat = flatten_for_slots(data);
  let mut out = String::with_capacity(markup.len());
  let mut rest = markup;
  while let Some(start) = rest.find(SLOT_OPEN) {
    out.push_str(&rest[..start]);
    let after_open = &rest[start + SLOT_OPEN.len()..];
    let Some(end) = after_open.find(SLOT_CLOSE) else {
      out.push_str(&rest[start..]);
      return out;
    };
    let key = after_open[..end].trim();
    match slot_value(&flat, key) {
      Some(value) => out.push_str(&value),
      None => out.push_str(&rest[start..start + SLOT_OPEN.len() + end + SLOT_CLOSE.len()]),
    }
    rest = &after_open[end + SLOT_CLOSE.len()..];
  }
  out.push_str(rest);
  out
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn replaces_string_slots() {
    let html = inject("<h1><!--weft:title--></h1>", &json!({"title": "Weft"}));
    assert_eq!(html, "<h1>Weft</h1>");
  }

  #[test]
  fn escapes_html_in_values() {
    let html = inject("<p><!--weft:body--></p>", &json!({"body": "<script>"}));
    assert_eq!(html, "<p>&lt;script&gt;</p>");
  }

  #[test]
  fn nested_values_resolve_after_flattening() {
    let data = json!({"film": {"title": "Alien"}});
    assert_eq!(inject("<!--weft:title-->", &data), "Alien");
    // The top-level key still resolves, serialized.
    assert_eq!(inject("<!--weft:film-->", &data), escape_html(r#"{"title":"Alien"}"#));
  }

  #[test]
  fn top_level_key_wins_on_collision() {
    let data = json!({"title": "outer", "film": {"title": "inner"}});
    assert_eq!(inject("<!--weft:title-->", &data), "outer");
  }

  #[test]
  fn unknown_slots_are_left_in_place() {
    let html = inject("<p><!--weft:missing--></p>", &json!({}));
    assert_eq!(html, "<p><!--weft:missing--></p>");
  }

  #[test]
  fn unterminated_slot_passes_through() {
    let html = inject("<p><!--weft:title", &json!({"title": "x"}));
    assert_eq!(html, "<p><!--weft:title");
  }
}
