//! Symbol name parsing and symbol → moniker conversion.
//!
//! The exact grammar of a symbol name is out of scope here (it belongs to
//! whatever wrote the index); this module only pulls out the scheme,
//! optional package coordinates, and the full string as identifier, per
//! the conversion rules the traversal engine depends on.

use serde::{Deserialize, Serialize};

use crate::error::GatherError;

/// Prefix marking a symbol as local to the index that produced it. Such
/// symbols can never be looked up across indexes and must never reach
/// cross-index chasing.
pub const LOCAL_SYMBOL_PREFIX: &str = "lsif .";

/// Package coordinates of a moniker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInformation {
    pub manager: String,
    pub name: String,
    pub version: String,
}

/// A symbol name resolved into its cross-index-comparable identity.
///
/// `identifier` is always the full, original symbol string: remote store
/// lookups are by exact symbol string, never by a reconstructed form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualifiedMoniker {
    pub scheme: String,
    pub identifier: String,
    pub package: PackageInformation,
}

struct ParsedSymbol {
    scheme: String,
    package: Option<PackageInformation>,
}

/// Parses a symbol name into `(scheme, package?)`. The descriptor portion
/// is dropped: callers that need cross-index identity only ever want the
/// full symbol string back as `identifier`.
fn parse_symbol(symbol: &str) -> Result<ParsedSymbol, GatherError> {
    let mut tokens = symbol.split_whitespace();
    let scheme = tokens.next().ok_or_else(|| GatherError::SymbolParseError {
        symbol: symbol.to_string(),
        reason: "empty symbol".to_string(),
    })?;

    let manager = tokens.next();
    let name = tokens.next();
    let version = tokens.next();

    let package = match (manager, name, version) {
        (Some(manager), Some(name), Some(version)) if manager != "." || name != "." => {
            Some(PackageInformation {
                manager: manager.to_string(),
                name: name.to_string(),
                version: version.to_string(),
            })
        }
        _ => None,
    };

    Ok(ParsedSymbol {
        scheme: scheme.to_string(),
        package,
    })
}

/// Converts discovered symbol names into `QualifiedMoniker`s.
///
/// A symbol that fails to parse fails the whole call (it indicates the
/// cursor holds a name the local phase should never have put there). A
/// symbol that parses but carries no package component is silently
/// dropped: it isn't an identity that can be looked up across indexes.
pub fn symbols_to_monikers(symbol_names: &[String]) -> Result<Vec<QualifiedMoniker>, GatherError> {
    let mut monikers = Vec::with_capacity(symbol_names.len());
    for symbol_name in symbol_names {
        let parsed = parse_symbol(symbol_name)?;
        let Some(package) = parsed.package else {
            continue;
        };
        monikers.push(QualifiedMoniker {
            scheme: parsed.scheme,
            identifier: symbol_name.clone(),
            package,
        });
    }
    Ok(monikers)
}

/// Whether a symbol name must be excluded from cross-index chasing.
pub fn is_local_symbol(symbol_name: &str) -> bool {
    symbol_name.starts_with(LOCAL_SYMBOL_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_local_symbols_before_moniker_conversion() {
        assert!(is_local_symbol("lsif .foo bar"));
        assert!(!is_local_symbol("scip-rust cargo serde 1.0 foo#bar()."));
    }

    #[test]
    fn symbol_without_package_is_dropped_silently() {
        let monikers = symbols_to_monikers(&["scip-rust".to_string()]).unwrap();
        assert!(monikers.is_empty());
    }

    #[test]
    fn symbol_with_package_round_trips_full_string_as_identifier() {
        let symbol = "scip-rust cargo serde 1.0.188 struct Serializer#".to_string();
        let monikers = symbols_to_monikers(std::slice::from_ref(&symbol)).unwrap();
        assert_eq!(monikers.len(), 1);
        assert_eq!(monikers[0].identifier, symbol);
        assert_eq!(monikers[0].package.name, "serde");
        assert_eq!(monikers[0].package.version, "1.0.188");
    }

    #[test]
    fn empty_symbol_fails_to_parse() {
        assert!(symbols_to_monikers(&[String::new()]).is_err());
    }
}
