//! Resolution of the type *names* carried by pre-V14 metadata.
//!
//! Legacy metadata describes call arguments, storage entries, events and
//! constants with the type names as written in the runtime source, e.g.
//! `Compact<T::Balance>` or `<T::Lookup as StaticLookup>::Source`. This module
//! parses those names and interns them into a [`TypeTable`], using a set of
//! well-known aliases which callers can extend with chain specific ones.
//!
//! Names that cannot be resolved still get an id allocated. Using such an id
//! results in [`Error::UnknownTypeId`] carrying the original name.

use crate::ty::{Field, Primitive, RuntimeType, TypeEntry, TypeId, TypeTable, Variant};
use crate::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::fmt;

const DEFAULT_ALIASES: &[(&str, &str)] = &[
    ("AccountId", "AccountId32"),
    ("AccountId32", "[u8; 32]"),
    ("AccountIndex", "u32"),
    ("Address", "MultiAddress"),
    ("LookupSource", "MultiAddress"),
    ("Signature", "MultiSignature"),
    ("Balance", "u128"),
    ("BalanceOf", "Balance"),
    ("Tip", "Balance"),
    ("BlockNumber", "u32"),
    ("Index", "u32"),
    ("Nonce", "u32"),
    ("Hash", "H256"),
    ("BlockHash", "Hash"),
    ("H160", "[u8; 20]"),
    ("H256", "[u8; 32]"),
    ("H512", "[u8; 64]"),
    ("Moment", "u64"),
    ("Weight", "u64"),
    ("Perbill", "u32"),
    ("Permill", "u32"),
    ("Perquintill", "u64"),
    ("Percent", "u8"),
    ("Bytes", "Vec<u8>"),
    ("Key", "Vec<u8>"),
    ("SessionIndex", "u32"),
    ("EraIndex", "u32"),
    ("ReferendumIndex", "u32"),
    ("PropIndex", "u32"),
    ("ProposalIndex", "u32"),
    ("MemberCount", "u32"),
    ("SS58Prefix", "u8"),
];

/// Signed extension identifiers and their `(extra, additional signed)` types
/// for metadata versions that only list the identifiers.
const DEFAULT_SIGNED_EXTENSIONS: &[(&str, &str, &str)] = &[
    ("CheckNonZeroSender", "()", "()"),
    ("CheckSpecVersion", "()", "u32"),
    ("CheckTxVersion", "()", "u32"),
    ("CheckGenesis", "()", "Hash"),
    ("CheckMortality", "Era", "Hash"),
    ("CheckEra", "Era", "Hash"),
    ("CheckNonce", "Compact<Index>", "()"),
    ("CheckWeight", "()", "()"),
    ("ChargeTransactionPayment", "Compact<Balance>", "()"),
];

/// Type definitions used to resolve legacy type names.
#[derive(Debug, Clone)]
pub struct LegacyTypes {
    aliases: HashMap<String, String>,
    signed_extensions: HashMap<String, (String, String)>,
}

impl Default for LegacyTypes {
    fn default() -> Self {
        LegacyTypes {
            aliases: DEFAULT_ALIASES
                .iter()
                .map(|(name, def)| (name.to_string(), def.to_string()))
                .collect(),
            signed_extensions: DEFAULT_SIGNED_EXTENSIONS
                .iter()
                .map(|(name, extra, additional)| {
                    (name.to_string(), (extra.to_string(), additional.to_string()))
                })
                .collect(),
        }
    }
}

impl LegacyTypes {
    pub fn new() -> Self {
        Default::default()
    }
    /// Define `name` as an alias of the type expression `definition`, e.g.
    /// `("ReferendumIndex", "u32")` or `("Votes", "Vec<AccountId>")`.
    pub fn with_alias<N: Into<String>, D: Into<String>>(mut self, name: N, definition: D) -> Self {
        self.insert(name, definition);
        self
    }
    pub fn insert<N: Into<String>, D: Into<String>>(&mut self, name: N, definition: D) {
        self.aliases.insert(name.into(), definition.into());
    }
    /// Describe a signed extension which legacy metadata only lists by name.
    pub fn with_signed_extension<N, E, A>(mut self, identifier: N, extra: E, additional: A) -> Self
    where
        N: Into<String>,
        E: Into<String>,
        A: Into<String>,
    {
        self.signed_extensions
            .insert(identifier.into(), (extra.into(), additional.into()));
        self
    }
    pub(crate) fn signed_extension(&self, identifier: &str) -> Option<(&str, &str)> {
        self.signed_extensions
            .get(identifier)
            .map(|(extra, additional)| (extra.as_str(), additional.as_str()))
    }
    pub(crate) fn resolver(&self) -> Resolver<'_> {
        Resolver {
            legacy: self,
            table: TypeTable::new(),
            by_name: HashMap::new(),
            in_progress: HashSet::new(),
        }
    }
}

/// A parsed legacy type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    Path { name: String, args: Vec<TypeExpr> },
    Tuple(Vec<TypeExpr>),
    Array(Box<TypeExpr>, u32),
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Path { name, args } if args.is_empty() => write!(f, "{}", name),
            TypeExpr::Path { name, args } => {
                write!(f, "{}<", name)?;
                write_list(f, args)?;
                write!(f, ">")
            }
            TypeExpr::Tuple(elems) => {
                write!(f, "(")?;
                write_list(f, elems)?;
                write!(f, ")")
            }
            TypeExpr::Array(elem, len) => write!(f, "[{}; {}]", elem, len),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, list: &[TypeExpr]) -> fmt::Result {
    for (idx, expr) in list.iter().enumerate() {
        if idx > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", expr)?;
    }

    Ok(())
}

impl TypeExpr {
    pub fn parse(input: &str) -> Result<Self> {
        let mut parser = Parser {
            input,
            chars: input.char_indices().peekable(),
        };

        let expr = parser.parse_type()?;
        parser.skip_whitespace();
        if parser.chars.peek().is_some() {
            return Err(Error::InvalidTypeName(input.to_string()));
        }

        Ok(expr)
    }
}

struct Parser<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> Parser<'a> {
    fn err(&self) -> Error {
        Error::InvalidTypeName(self.input.to_string())
    }
    fn skip_whitespace(&mut self) {
        while matches!(self.chars.peek(), Some((_, c)) if c.is_whitespace()) {
            self.chars.next();
        }
    }
    fn peek(&mut self) -> Option<char> {
        self.skip_whitespace();
        self.chars.peek().map(|(_, c)| *c)
    }
    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }
    fn expect(&mut self, expected: char) -> Result<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.err())
        }
    }
    fn ident(&mut self) -> Result<String> {
        self.skip_whitespace();
        let mut ident = String::new();
        while let Some((_, c)) = self.chars.peek() {
            if c.is_alphanumeric() || *c == '_' {
                ident.push(*c);
                self.chars.next();
            } else {
                break;
            }
        }

        if ident.is_empty() {
            Err(self.err())
        } else {
            Ok(ident)
        }
    }
    /// Parses `a::b::C`, returning the last segment.
    fn path(&mut self) -> Result<String> {
        let mut last = self.ident()?;
        while self.peek() == Some(':') {
            self.expect(':')?;
            self.expect(':')?;
            last = self.ident()?;
        }

        Ok(last)
    }
    fn list(&mut self, close: char) -> Result<Vec<TypeExpr>> {
        let mut items = vec![];
        while !self.eat(close) {
            items.push(self.parse_type()?);
            if !self.eat(',') {
                self.expect(close)?;
                break;
            }
        }

        Ok(items)
    }
    fn parse_type(&mut self) -> Result<TypeExpr> {
        match self.peek().ok_or_else(|| self.err())? {
            '(' => {
                self.chars.next();
                let mut elems = self.list(')')?;
                if elems.len() == 1 {
                    Ok(elems.remove(0))
                } else {
                    Ok(TypeExpr::Tuple(elems))
                }
            }
            '[' => {
                self.chars.next();
                let elem = self.parse_type()?;
                if self.eat(']') {
                    return Ok(TypeExpr::Path {
                        name: "Vec".into(),
                        args: vec![elem],
                    });
                }
                self.expect(';')?;
                let len = self.ident()?.parse().map_err(|_| self.err())?;
                self.expect(']')?;
                Ok(TypeExpr::Array(Box::new(elem), len))
            }
            '&' => {
                // `&'static [u8]` and friends, encoded like the referenced type.
                self.chars.next();
                if self.eat('\'') {
                    self.ident()?;
                }
                self.parse_type()
            }
            '<' => {
                // Qualified path: `<T as Trait<I>>::Name`.
                self.chars.next();
                self.parse_type()?;
                let keyword = self.ident()?;
                if keyword != "as" {
                    return Err(self.err());
                }
                let trait_name = self.path()?;
                if self.eat('<') {
                    self.list('>')?;
                }
                self.expect('>')?;
                self.expect(':')?;
                self.expect(':')?;
                let name = self.path()?;
                let name = if trait_name == "StaticLookup" && name == "Source" {
                    "LookupSource".to_string()
                } else {
                    name
                };
                Ok(TypeExpr::Path { name, args: vec![] })
            }
            _ => {
                let name = self.path()?;
                let args = if self.eat('<') {
                    self.list('>')?
                } else {
                    vec![]
                };
                Ok(TypeExpr::Path { name, args })
            }
        }
    }
}

/// Interns legacy type names into a [`TypeTable`].
pub(crate) struct Resolver<'a> {
    legacy: &'a LegacyTypes,
    table: TypeTable,
    by_name: HashMap<String, TypeId>,
    in_progress: HashSet<String>,
}

impl<'a> Resolver<'a> {
    pub fn legacy(&self) -> &'a LegacyTypes {
        self.legacy
    }
    /// Resolves a legacy type name, e.g. `Compact<T::Balance>`.
    pub fn resolve(&mut self, name: &str) -> Result<TypeId> {
        let expr = TypeExpr::parse(name)?;
        self.resolve_expr(&expr)
    }
    pub fn push(&mut self, entry: TypeEntry) -> TypeId {
        self.table.push(entry)
    }
    /// Allocates an id for `name` which is defined later via [`Resolver::define`].
    pub fn reserve(&mut self, name: &str) -> TypeId {
        let id = self.table.reserve(name);
        self.by_name.insert(name.to_string(), id);
        id
    }
    pub fn define(&mut self, id: TypeId, entry: TypeEntry) {
        self.table.define(id, entry)
    }
    pub fn finish(self) -> TypeTable {
        let unresolved: Vec<_> = self.table.unresolved().map(|(_, name)| name).collect();
        if !unresolved.is_empty() {
            log::debug!("Unresolved legacy type names: {:?}", unresolved);
        }

        self.table
    }
    fn resolve_expr(&mut self, expr: &TypeExpr) -> Result<TypeId> {
        let key = expr.to_string();
        if let Some(id) = self.by_name.get(&key) {
            return Ok(*id);
        }

        let id = match expr {
            TypeExpr::Tuple(elems) => {
                let ids = elems
                    .iter()
                    .map(|e| self.resolve_expr(e))
                    .collect::<Result<_>>()?;
                self.push(TypeEntry::new(RuntimeType::Tuple(ids)))
            }
            TypeExpr::Array(elem, len) => {
                let of = self.resolve_expr(elem)?;
                self.push(TypeEntry::new(RuntimeType::Array { of, len: *len }))
            }
            TypeExpr::Path { name, args } => self.resolve_path(&key, name, args)?,
        };

        self.by_name.insert(key, id);
        Ok(id)
    }
    fn resolve_path(&mut self, key: &str, name: &str, args: &[TypeExpr]) -> Result<TypeId> {
        let arg = |idx: usize| generic_arg(key, args, idx);

        let ty = match name {
            "Vec" | "BoundedVec" | "WeakBoundedVec" | "BTreeSet" | "VecDeque" => {
                RuntimeType::Sequence(self.resolve_expr(arg(0)?)?)
            }
            "BTreeMap" | "HashMap" => {
                let pair = TypeExpr::Tuple(vec![arg(0)?.clone(), arg(1)?.clone()]);
                RuntimeType::Sequence(self.resolve_expr(&pair)?)
            }
            "Compact" => RuntimeType::Compact(self.resolve_expr(arg(0)?)?),
            "Box" | "Rc" | "Arc" => return self.resolve_expr(arg(0)?),
            "PhantomData" => RuntimeType::Tuple(vec![]),
            "Option" => {
                let some = self.resolve_expr(arg(0)?)?;
                return Ok(self.push(
                    TypeEntry::new(RuntimeType::Variant(vec![
                        variant(0, "None", vec![]),
                        variant(1, "Some", vec![Field::unnamed(some)]),
                    ]))
                    .with_path(["Option"]),
                ));
            }
            "Result" => {
                let ok = self.resolve_expr(arg(0)?)?;
                let err = self.resolve_expr(arg(1)?)?;
                return Ok(self.push(
                    TypeEntry::new(RuntimeType::Variant(vec![
                        variant(0, "Ok", vec![Field::unnamed(ok)]),
                        variant(1, "Err", vec![Field::unnamed(err)]),
                    ]))
                    .with_path(["Result"]),
                ));
            }
            _ => {
                if let Some(prim) = Primitive::from_name(name) {
                    RuntimeType::Primitive(prim)
                } else if let Some(definition) = self.legacy.aliases.get(name) {
                    return self.resolve_alias(name, definition);
                } else if let Some(id) = self.builtin(name)? {
                    return Ok(id);
                } else {
                    log::trace!("Unknown legacy type name: {}", key);
                    return Ok(self.table.reserve(key));
                }
            }
        };

        Ok(self.push(TypeEntry::new(ty)))
    }
    fn resolve_alias(&mut self, name: &str, definition: &str) -> Result<TypeId> {
        if !self.in_progress.insert(name.to_string()) {
            return Err(Error::InvalidTypeName(format!(
                "{} (recursive alias)",
                name
            )));
        }

        let res = self.resolve(definition);
        self.in_progress.remove(name);
        let id = res?;

        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }
    /// Structural types which cannot be expressed as a plain alias.
    fn builtin(&mut self, name: &str) -> Result<Option<TypeId>> {
        let entry = match name {
            "MultiAddress" => {
                let account = self.resolve("AccountId")?;
                let index = self.resolve("Compact<AccountIndex>")?;
                let raw = self.resolve("Vec<u8>")?;
                let addr32 = self.resolve("[u8; 32]")?;
                let addr20 = self.resolve("[u8; 20]")?;
                TypeEntry::new(RuntimeType::Variant(vec![
                    variant(0, "Id", vec![Field::unnamed(account)]),
                    variant(1, "Index", vec![Field::unnamed(index)]),
                    variant(2, "Raw", vec![Field::unnamed(raw)]),
                    variant(3, "Address32", vec![Field::unnamed(addr32)]),
                    variant(4, "Address20", vec![Field::unnamed(addr20)]),
                ]))
                .with_path(["sp_runtime", "multiaddress", "MultiAddress"])
            }
            "MultiSignature" => {
                let sig64 = self.resolve("[u8; 64]")?;
                let sig65 = self.resolve("[u8; 65]")?;
                TypeEntry::new(RuntimeType::Variant(vec![
                    variant(0, "Ed25519", vec![Field::unnamed(sig64)]),
                    variant(1, "Sr25519", vec![Field::unnamed(sig64)]),
                    variant(2, "Ecdsa", vec![Field::unnamed(sig65)]),
                ]))
                .with_path(["sp_runtime", "MultiSignature"])
            }
            "Era" => {
                let byte = self.resolve("u8")?;
                let mut variants = vec![variant(0, "Immortal", vec![])];
                for idx in 1..=255u8 {
                    variants.push(variant(
                        idx,
                        &format!("Mortal{}", idx),
                        vec![Field::unnamed(byte)],
                    ));
                }
                TypeEntry::new(RuntimeType::Variant(variants))
                    .with_path(["sp_runtime", "generic", "era", "Era"])
            }
            _ => return Ok(None),
        };

        let id = self.push(entry);
        self.by_name.insert(name.to_string(), id);
        Ok(Some(id))
    }
}

fn generic_arg<'e>(key: &str, args: &'e [TypeExpr], idx: usize) -> Result<&'e TypeExpr> {
    args.get(idx)
        .ok_or_else(|| Error::InvalidTypeName(key.to_string()))
}

fn variant(index: u8, name: &str, fields: Vec<Field>) -> Variant {
    Variant {
        index,
        name: name.to_string(),
        fields,
        docs: vec![],
    }
}
