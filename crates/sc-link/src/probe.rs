//! Data-less walk over a type's serde shape.
//!
//! [`check_shape`] drives `T::deserialize` with a deserializer that invents
//! a minimal value for every request: zero for numbers, empty strings, one
//! element per sequence or map, `Some` for options and every declared field
//! of a struct. Past the depth limit options come back `None` and sequences
//! and maps come back empty, so recursive types still finish a walk.
//!
//! An enum takes one variant per walk, so the type is walked repeatedly.
//! Each enum site is keyed by its structural path (fields, elements and the
//! variants chosen above it). A walk picks, at every site, the first variant
//! that still has something unexplored below it, and walking stops once a
//! walk reaches no (site, variant) pair that earlier walks had not. Every
//! reachable variant of every nested enum is therefore visited, within
//! `MAX_PASSES` walks.
//!
//! If a walk reaches a self-managed type its `Deserialize` impl fails with
//! [`GuardViolation::DecodeSelfCalled`], which is reported. Any other failure
//! (a validating `deserialize_with`, an untagged enum) just ends that walk;
//! the real decoder still refuses guarded data it reaches.

use crate::guard::{violation_in, GuardViolation};
use serde::de::value::BorrowedStrDeserializer;
use serde::de::{
    self, DeserializeOwned, DeserializeSeed, EnumAccess, MapAccess, SeqAccess, VariantAccess,
    Visitor,
};
use std::cell::RefCell;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

const MAX_DEPTH: usize = 32;
const MAX_PASSES: usize = 256;

/// An enum site (by path hash) and one of its variant indices.
type Pair = (u64, usize);

/// Report whether the static shape of `T` reaches a self-managed type.
pub(crate) fn check_shape<T: DeserializeOwned>() -> Result<(), GuardViolation> {
    let mut explored = Explored::default();
    for pass in 0..MAX_PASSES {
        let walk = Walk {
            complete: &explored.complete,
            visits: RefCell::default(),
        };
        let result = T::deserialize(Probe::root(&walk));
        let visits = walk.visits.into_inner();
        if let Err(err) = result {
            if let Some(violation) = violation_in(&err.0) {
                return Err(violation);
            }
            tracing::trace!(reason = %err.0, pass, "shape probe stopped early");
        }
        if !explored.record(visits) {
            break;
        }
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub(crate) struct ProbeError(String);

impl de::Error for ProbeError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        Self(msg.to_string())
    }
}

/// One enum site met during a walk and the variant taken there.
struct Visit {
    site: u64,
    /// The enclosing (site, variant), if this enum sits inside another.
    parent: Option<Pair>,
    variant: usize,
    variants: usize,
}

/// What all walks so far have seen.
#[derive(Default)]
struct Explored {
    variants: HashMap<u64, usize>,
    visited: HashSet<Pair>,
    children: HashMap<Pair, HashSet<u64>>,
    /// Visited pairs with nothing left to explore below them.
    complete: HashSet<Pair>,
}

impl Explored {
    /// Fold one walk in. Returns whether it took a variant no earlier walk had.
    fn record(&mut self, visits: Vec<Visit>) -> bool {
        let mut progressed = false;
        for visit in visits {
            self.variants.insert(visit.site, visit.variants);
            progressed |= self.visited.insert((visit.site, visit.variant));
            if let Some(parent) = visit.parent {
                self.children.entry(parent).or_default().insert(visit.site);
            }
        }
        self.settle();
        progressed
    }

    fn settle(&mut self) {
        self.complete.clear();
        loop {
            let settled: Vec<Pair> = self
                .visited
                .iter()
                .copied()
                .filter(|pair| !self.complete.contains(pair))
                .filter(|pair| {
                    self.children
                        .get(pair)
                        .map_or(true, |sites| sites.iter().all(|&site| self.site_complete(site)))
                })
                .collect();
            if settled.is_empty() {
                break;
            }
            self.complete.extend(settled);
        }
    }

    fn site_complete(&self, site: u64) -> bool {
        self.variants.get(&site).is_some_and(|&count| {
            (0..count).all(|variant| self.complete.contains(&(site, variant)))
        })
    }
}

/// State of a single walk.
struct Walk<'a> {
    complete: &'a HashSet<Pair>,
    visits: RefCell<Vec<Visit>>,
}

impl Walk<'_> {
    fn choose(&self, site: u64, variants: usize) -> usize {
        (0..variants)
            .find(|&variant| !self.complete.contains(&(site, variant)))
            .unwrap_or(0)
    }
}

/// One step of a structural path.
#[derive(Hash)]
enum Segment {
    Some,
    Newtype,
    Element(usize),
    Key,
    Value,
    Field(&'static str),
    Variant(usize),
}

#[derive(Clone, Copy)]
struct Probe<'a> {
    depth: usize,
    path: u64,
    enclosing: Option<Pair>,
    walk: &'a Walk<'a>,
}

impl<'a> Probe<'a> {
    const fn root(walk: &'a Walk<'a>) -> Self {
        Self {
            depth: 0,
            path: 0,
            enclosing: None,
            walk,
        }
    }

    const fn exhausted(self) -> bool {
        self.depth >= MAX_DEPTH
    }

    fn child(self, segment: Segment) -> Result<Self, ProbeError> {
        if self.exhausted() {
            return Err(ProbeError("shape probe depth exhausted".to_string()));
        }
        let mut hasher = DefaultHasher::new();
        (self.path, segment).hash(&mut hasher);
        Ok(Self {
            depth: self.depth + 1,
            path: hasher.finish(),
            ..self
        })
    }
}

macro_rules! probe_scalars {
    ($($method:ident => $visit:ident($($value:expr)?);)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ProbeError> {
                visitor.$visit($($value)?)
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for Probe<'_> {
    type Error = ProbeError;

    probe_scalars! {
        deserialize_any => visit_unit();
        deserialize_bool => visit_bool(false);
        deserialize_i8 => visit_i8(0);
        deserialize_i16 => visit_i16(0);
        deserialize_i32 => visit_i32(0);
        deserialize_i64 => visit_i64(0);
        deserialize_u8 => visit_u8(0);
        deserialize_u16 => visit_u16(0);
        deserialize_u32 => visit_u32(0);
        deserialize_u64 => visit_u64(0);
        deserialize_f32 => visit_f32(0.0);
        deserialize_f64 => visit_f64(0.0);
        deserialize_char => visit_char('\0');
        deserialize_str => visit_borrowed_str("");
        deserialize_string => visit_borrowed_str("");
        deserialize_bytes => visit_borrowed_bytes(&[]);
        deserialize_byte_buf => visit_borrowed_bytes(&[]);
        deserialize_unit => visit_unit();
        deserialize_identifier => visit_borrowed_str("");
        deserialize_ignored_any => visit_unit();
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ProbeError> {
        if self.exhausted() {
            return visitor.visit_none();
        }
        visitor.visit_some(self.child(Segment::Some)?)
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, ProbeError> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, ProbeError> {
        visitor.visit_newtype_struct(self.child(Segment::Newtype)?)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ProbeError> {
        let remaining = usize::from(!self.exhausted());
        visitor.visit_seq(ProbeSeq {
            remaining,
            index: 0,
            probe: self,
        })
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, ProbeError> {
        visitor.visit_seq(ProbeSeq {
            remaining: len,
            index: 0,
            probe: self,
        })
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, ProbeError> {
        self.deserialize_tuple(len, visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ProbeError> {
        let remaining = usize::from(!self.exhausted());
        visitor.visit_map(ProbeEntries {
            remaining,
            probe: self,
        })
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, ProbeError> {
        visitor.visit_map(ProbeFields {
            fields: fields.iter(),
            current: "",
            probe: self,
        })
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, ProbeError> {
        if variants.is_empty() {
            return Err(ProbeError("enum without variants".to_string()));
        }
        let site = self.path;
        let variant = self.walk.choose(site, variants.len());
        let inner = Probe {
            enclosing: Some((site, variant)),
            ..self.child(Segment::Variant(variant))?
        };
        self.walk.visits.borrow_mut().push(Visit {
            site,
            parent: self.enclosing,
            variant,
            variants: variants.len(),
        });
        visitor.visit_enum(ProbeEnum {
            variant: variants[variant],
            probe: inner,
        })
    }

    fn is_human_readable(&self) -> bool {
        false
    }
}

struct ProbeSeq<'a> {
    remaining: usize,
    index: usize,
    probe: Probe<'a>,
}

impl<'de> SeqAccess<'de> for ProbeSeq<'_> {
    type Error = ProbeError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, ProbeError> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        let element = self.probe.child(Segment::Element(self.index))?;
        self.index += 1;
        seed.deserialize(element).map(Some)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.remaining)
    }
}

struct ProbeEntries<'a> {
    remaining: usize,
    probe: Probe<'a>,
}

impl<'de> MapAccess<'de> for ProbeEntries<'_> {
    type Error = ProbeError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, ProbeError> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        seed.deserialize(self.probe.child(Segment::Key)?).map(Some)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, ProbeError> {
        seed.deserialize(self.probe.child(Segment::Value)?)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.remaining)
    }
}

struct ProbeFields<'a> {
    fields: std::slice::Iter<'static, &'static str>,
    current: &'static str,
    probe: Probe<'a>,
}

impl<'de> MapAccess<'de> for ProbeFields<'_> {
    type Error = ProbeError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, ProbeError> {
        match self.fields.next() {
            Some(&field) => {
                self.current = field;
                seed.deserialize(BorrowedStrDeserializer::<ProbeError>::new(field))
                    .map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, ProbeError> {
        seed.deserialize(self.probe.child(Segment::Field(self.current))?)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.fields.len())
    }
}

struct ProbeEnum<'a> {
    variant: &'static str,
    probe: Probe<'a>,
}

impl<'de, 'a> EnumAccess<'de> for ProbeEnum<'a> {
    type Error = ProbeError;
    type Variant = ProbeVariant<'a>;

    fn variant_seed<V: DeserializeSeed<'de>>(
        self,
        seed: V,
    ) -> Result<(V::Value, ProbeVariant<'a>), ProbeError> {
        let value = seed.deserialize(BorrowedStrDeserializer::<ProbeError>::new(self.variant))?;
        Ok((value, ProbeVariant(self.probe)))
    }
}

struct ProbeVariant<'a>(Probe<'a>);

impl<'de> VariantAccess<'de> for ProbeVariant<'_> {
    type Error = ProbeError;

    fn unit_variant(self) -> Result<(), ProbeError> {
        Ok(())
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> Result<T::Value, ProbeError> {
        seed.deserialize(self.0)
    }

    fn tuple_variant<V: Visitor<'de>>(self, len: usize, visitor: V) -> Result<V::Value, ProbeError> {
        visitor.visit_seq(ProbeSeq {
            remaining: len,
            index: 0,
            probe: self.0,
        })
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, ProbeError> {
        visitor.visit_map(ProbeFields {
            fields: fields.iter(),
            current: "",
            probe: self.0,
        })
    }
}
