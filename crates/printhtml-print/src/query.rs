// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Query-string decoding.
//
// Only `%XX` escapes are decoded; `+` stays a literal plus sign.  Decoded
// bytes are read as UTF-8 with invalid sequences replaced.

use std::collections::HashMap;

use percent_encoding::percent_decode_str;

/// Decoded query parameters. Later duplicates overwrite earlier ones.
pub type QueryParams = HashMap<String, String>;

/// Decode `a=1&b=%20x` into a name/value map.
///
/// Empty segments, segments without `=`, and segments with an empty name
/// (`=value`) are dropped.
pub fn decode(query: &str) -> QueryParams {
    let mut params = QueryParams::new();
    for pair in query.split('&').filter(|s| !s.is_empty()) {
        let Some(eq) = pair.find('=') else {
            continue;
        };
        if eq == 0 {
            continue;
        }
        let key = percent_decode_str(&pair[..eq]).decode_utf8_lossy();
        let value = percent_decode_str(&pair[eq + 1..]).decode_utf8_lossy();
        params.insert(key.into_owned(), value.into_owned());
    }
    params
}
