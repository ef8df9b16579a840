//! Structural content hashing for change detection
//!
//! [`template_hash`] fingerprints any `Serialize` value by walking its serde
//! data model into a canonical byte encoding and digesting that with
//! truncated SHA-256. Two values with the same structure hash the same no
//! matter how they are stored:
//!
//! - map entries are encoded individually and sorted by their encoded key,
//!   so insertion order (and `HashMap` vs `BTreeMap`) never matters
//! - smart pointers (`Box`, `Rc`, `Arc`) serialize as their pointee, so a
//!   copy hashes like the original
//!
//! The hash is a change-detection fingerprint, not a security boundary.
//! 64 bits of output keep accidental collisions out of reach for the
//! object counts a cluster holds.
//!
//! Hashing never fails. Nesting deeper than [`MAX_HASH_DEPTH`] is encoded as
//! a truncation marker and not traversed further, which also bounds values
//! whose `Serialize` impl follows a reference cycle. An error raised by a
//! value's own `Serialize` impl is folded into the encoding as a marker
//! carrying the error message.

use std::fmt::{self, Display};

use aws_lc_rs::digest;
use serde::ser::{self, Serialize};

/// Nesting depth past which values are replaced by a truncation marker
pub const MAX_HASH_DEPTH: usize = 64;

/// Bytes of SHA-256 output kept in the fingerprint (16 hex chars)
const HASH_BYTES: usize = 8;

// Encoding tags. Every encoded value starts with exactly one of these.
const TAG_UNIT: u8 = 0x00;
const TAG_BOOL: u8 = 0x01;
const TAG_INT: u8 = 0x02;
const TAG_UINT: u8 = 0x03;
const TAG_FLOAT: u8 = 0x04;
const TAG_CHAR: u8 = 0x05;
const TAG_STR: u8 = 0x06;
const TAG_BYTES: u8 = 0x07;
const TAG_NONE: u8 = 0x08;
const TAG_SOME: u8 = 0x09;
const TAG_UNIT_STRUCT: u8 = 0x0a;
const TAG_UNIT_VARIANT: u8 = 0x0b;
const TAG_NEWTYPE_STRUCT: u8 = 0x0c;
const TAG_NEWTYPE_VARIANT: u8 = 0x0d;
const TAG_SEQ: u8 = 0x0e;
const TAG_TUPLE: u8 = 0x0f;
const TAG_TUPLE_STRUCT: u8 = 0x10;
const TAG_TUPLE_VARIANT: u8 = 0x11;
const TAG_MAP: u8 = 0x12;
const TAG_STRUCT: u8 = 0x13;
const TAG_STRUCT_VARIANT: u8 = 0x14;
const TAG_ELEMENT: u8 = 0x20;
const TAG_FIELD: u8 = 0x21;
const TAG_ENTRY: u8 = 0x22;
const TAG_END: u8 = 0x2f;
const TAG_TRUNCATED: u8 = 0x3e;
const TAG_ERROR: u8 = 0x3f;

/// Compute the template hash of a value: 16 lowercase hex characters.
pub fn template_hash<T: Serialize + ?Sized>(value: &T) -> String {
    let encoded = canonical_bytes(value);
    let hash = digest::digest(&digest::SHA256, &encoded);
    hex_encode(&hash.as_ref()[..HASH_BYTES])
}

/// Encode a value into the canonical byte form that [`template_hash`] digests.
pub fn canonical_bytes<T: Serialize + ?Sized>(value: &T) -> Vec<u8> {
    let mut encoder = Encoder::at_depth(0);
    if let Err(EncodeError(message)) = value.serialize(&mut encoder) {
        encoder.tag(TAG_ERROR);
        encoder.bytes(message.as_bytes());
    }
    encoder.buf
}

/// Lowercase hex encoding
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
            use std::fmt::Write;
            let _ = write!(s, "{:02x}", b);
            s
        })
}

#[derive(Debug)]
struct EncodeError(String);

impl Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for EncodeError {}

impl ser::Error for EncodeError {
    fn custom<T: Display>(msg: T) -> Self {
        EncodeError(msg.to_string())
    }
}

struct Encoder {
    buf: Vec<u8>,
    depth: usize,
}

impl Encoder {
    fn at_depth(depth: usize) -> Self {
        Self {
            buf: Vec::new(),
            depth,
        }
    }

    fn tag(&mut self, tag: u8) {
        self.buf.push(tag);
    }

    fn bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
        self.buf.extend_from_slice(bytes);
    }

    /// Enter a nested value. Returns true when the depth bound is hit, in
    /// which case only the truncation marker is written.
    fn open(&mut self, tag: u8) -> bool {
        if self.depth >= MAX_HASH_DEPTH {
            self.tag(TAG_TRUNCATED);
            return true;
        }
        self.tag(tag);
        self.depth += 1;
        false
    }

    fn close(&mut self) {
        self.tag(TAG_END);
        self.depth -= 1;
    }

    fn nested<T: Serialize + ?Sized>(&mut self, tag: u8, value: &T) -> Result<(), EncodeError> {
        if self.open(tag) {
            return Ok(());
        }
        value.serialize(&mut *self)?;
        self.close();
        Ok(())
    }

    fn compound(&mut self, tag: u8, names: &[&str]) -> Compound<'_> {
        let truncated = self.open(tag);
        if !truncated {
            for name in names {
                self.bytes(name.as_bytes());
            }
        }
        Compound {
            enc: self,
            truncated,
        }
    }
}

struct Compound<'a> {
    enc: &'a mut Encoder,
    truncated: bool,
}

impl Compound<'_> {
    fn element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        if self.truncated {
            return Ok(());
        }
        self.enc.tag(TAG_ELEMENT);
        value.serialize(&mut *self.enc)
    }

    fn field<T: Serialize + ?Sized>(&mut self, name: &str, value: &T) -> Result<(), EncodeError> {
        if self.truncated {
            return Ok(());
        }
        self.enc.tag(TAG_FIELD);
        self.enc.bytes(name.as_bytes());
        value.serialize(&mut *self.enc)
    }

    fn finish(self) -> Result<(), EncodeError> {
        if !self.truncated {
            self.enc.close();
        }
        Ok(())
    }
}

struct MapCompound<'a> {
    enc: &'a mut Encoder,
    truncated: bool,
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    pending_key: Option<Vec<u8>>,
}

impl MapCompound<'_> {
    fn encode_child<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, EncodeError> {
        let mut child = Encoder::at_depth(self.enc.depth);
        value.serialize(&mut child)?;
        Ok(child.buf)
    }
}

impl<'a> ser::Serializer for &'a mut Encoder {
    type Ok = ();
    type Error = EncodeError;
    type SerializeSeq = Compound<'a>;
    type SerializeTuple = Compound<'a>;
    type SerializeTupleStruct = Compound<'a>;
    type SerializeTupleVariant = Compound<'a>;
    type SerializeMap = MapCompound<'a>;
    type SerializeStruct = Compound<'a>;
    type SerializeStructVariant = Compound<'a>;

    fn serialize_bool(self, v: bool) -> Result<(), EncodeError> {
        self.tag(TAG_BOOL);
        self.buf.push(u8::from(v));
        Ok(())
    }

    fn serialize_i8(self, v: i8) -> Result<(), EncodeError> {
        self.serialize_i128(i128::from(v))
    }

    fn serialize_i16(self, v: i16) -> Result<(), EncodeError> {
        self.serialize_i128(i128::from(v))
    }

    fn serialize_i32(self, v: i32) -> Result<(), EncodeError> {
        self.serialize_i128(i128::from(v))
    }

    fn serialize_i64(self, v: i64) -> Result<(), EncodeError> {
        self.serialize_i128(i128::from(v))
    }

    fn serialize_i128(self, v: i128) -> Result<(), EncodeError> {
        self.tag(TAG_INT);
        self.buf.extend_from_slice(&v.to_le_bytes());
        Ok(())
    }

    fn serialize_u8(self, v: u8) -> Result<(), EncodeError> {
        self.serialize_u128(u128::from(v))
    }

    fn serialize_u16(self, v: u16) -> Result<(), EncodeError> {
        self.serialize_u128(u128::from(v))
    }

    fn serialize_u32(self, v: u32) -> Result<(), EncodeError> {
        self.serialize_u128(u128::from(v))
    }

    fn serialize_u64(self, v: u64) -> Result<(), EncodeError> {
        self.serialize_u128(u128::from(v))
    }

    fn serialize_u128(self, v: u128) -> Result<(), EncodeError> {
        self.tag(TAG_UINT);
        self.buf.extend_from_slice(&v.to_le_bytes());
        Ok(())
    }

    fn serialize_f32(self, v: f32) -> Result<(), EncodeError> {
        self.serialize_f64(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Result<(), EncodeError> {
        self.tag(TAG_FLOAT);
        self.buf.extend_from_slice(&v.to_bits().to_le_bytes());
        Ok(())
    }

    fn serialize_char(self, v: char) -> Result<(), EncodeError> {
        self.tag(TAG_CHAR);
        self.buf.extend_from_slice(&u32::from(v).to_le_bytes());
        Ok(())
    }

    fn serialize_str(self, v: &str) -> Result<(), EncodeError> {
        self.tag(TAG_STR);
        self.bytes(v.as_bytes());
        Ok(())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<(), EncodeError> {
        self.tag(TAG_BYTES);
        self.bytes(v);
        Ok(())
    }

    fn serialize_none(self) -> Result<(), EncodeError> {
        self.tag(TAG_NONE);
        Ok(())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<(), EncodeError> {
        self.nested(TAG_SOME, value)
    }

    fn serialize_unit(self) -> Result<(), EncodeError> {
        self.tag(TAG_UNIT);
        Ok(())
    }

    fn serialize_unit_struct(self, name: &'static str) -> Result<(), EncodeError> {
        self.tag(TAG_UNIT_STRUCT);
        self.bytes(name.as_bytes());
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<(), EncodeError> {
        self.tag(TAG_UNIT_VARIANT);
        self.bytes(name.as_bytes());
        self.bytes(variant.as_bytes());
        Ok(())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        name: &'static str,
        value: &T,
    ) -> Result<(), EncodeError> {
        if self.open(TAG_NEWTYPE_STRUCT) {
            return Ok(());
        }
        self.bytes(name.as_bytes());
        value.serialize(&mut *self)?;
        self.close();
        Ok(())
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<(), EncodeError> {
        if self.open(TAG_NEWTYPE_VARIANT) {
            return Ok(());
        }
        self.bytes(name.as_bytes());
        self.bytes(variant.as_bytes());
        value.serialize(&mut *self)?;
        self.close();
        Ok(())
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Compound<'a>, EncodeError> {
        Ok(self.compound(TAG_SEQ, &[]))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Compound<'a>, EncodeError> {
        Ok(self.compound(TAG_TUPLE, &[]))
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> Result<Compound<'a>, EncodeError> {
        Ok(self.compound(TAG_TUPLE_STRUCT, &[name]))
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Compound<'a>, EncodeError> {
        Ok(self.compound(TAG_TUPLE_VARIANT, &[name, variant]))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<MapCompound<'a>, EncodeError> {
        let truncated = self.open(TAG_MAP);
        Ok(MapCompound {
            enc: self,
            truncated,
            entries: Vec::new(),
            pending_key: None,
        })
    }

    fn serialize_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> Result<Compound<'a>, EncodeError> {
        Ok(self.compound(TAG_STRUCT, &[name]))
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Compound<'a>, EncodeError> {
        Ok(self.compound(TAG_STRUCT_VARIANT, &[name, variant]))
    }
}

impl ser::SerializeSeq for Compound<'_> {
    type Ok = ();
    type Error = EncodeError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.element(value)
    }

    fn end(self) -> Result<(), EncodeError> {
        self.finish()
    }
}

impl ser::SerializeTuple for Compound<'_> {
    type Ok = ();
    type Error = EncodeError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.element(value)
    }

    fn end(self) -> Result<(), EncodeError> {
        self.finish()
    }
}

impl ser::SerializeTupleStruct for Compound<'_> {
    type Ok = ();
    type Error = EncodeError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.element(value)
    }

    fn end(self) -> Result<(), EncodeError> {
        self.finish()
    }
}

impl ser::SerializeTupleVariant for Compound<'_> {
    type Ok = ();
    type Error = EncodeError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.element(value)
    }

    fn end(self) -> Result<(), EncodeError> {
        self.finish()
    }
}

impl ser::SerializeStruct for Compound<'_> {
    type Ok = ();
    type Error = EncodeError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), EncodeError> {
        self.field(key, value)
    }

    fn end(self) -> Result<(), EncodeError> {
        self.finish()
    }
}

impl ser::SerializeStructVariant for Compound<'_> {
    type Ok = ();
    type Error = EncodeError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), EncodeError> {
        self.field(key, value)
    }

    fn end(self) -> Result<(), EncodeError> {
        self.finish()
    }
}

impl ser::SerializeMap for MapCompound<'_> {
    type Ok = ();
    type Error = EncodeError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), EncodeError> {
        if self.truncated {
            return Ok(());
        }
        self.pending_key = Some(self.encode_child(key)?);
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        if self.truncated {
            return Ok(());
        }
        let value = self.encode_child(value)?;
        let key = self.pending_key.take().unwrap_or_default();
        self.entries.push((key, value));
        Ok(())
    }

    fn end(mut self) -> Result<(), EncodeError> {
        if self.truncated {
            return Ok(());
        }
        self.entries.sort();
        for (key, value) in &self.entries {
            self.enc.tag(TAG_ENTRY);
            self.enc.buf.extend_from_slice(key);
            self.enc.buf.extend_from_slice(value);
        }
        self.enc.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::{BTreeMap, HashMap};
    use std::rc::Rc;
    use std::sync::Arc;

    use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use proptest::prelude::*;
    use serde::Serialize;

    #[derive(Serialize, Clone, Debug)]
    struct Workload {
        name: String,
        replicas: i64,
        paused: bool,
        labels: BTreeMap<String, String>,
    }

    fn deployment_with_labels(pairs: &[(&str, &str)]) -> Deployment {
        let mut labels = BTreeMap::new();
        for (k, v) in pairs {
            labels.insert(k.to_string(), v.to_string());
        }
        Deployment {
            metadata: ObjectMeta {
                name: Some("store-operator".to_string()),
                namespace: Some("vaultsmith-system".to_string()),
                labels: Some(labels),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas: Some(1),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn hash_is_sixteen_hex_chars() {
        let hash = template_hash(&"anything");
        assert_eq!(hash.len(), 16);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn equivalent_copies_hash_identically() {
        let deployment = deployment_with_labels(&[("app", "store"), ("tier", "backend")]);
        let copy = deployment.clone();
        assert_eq!(template_hash(&deployment), template_hash(&copy));
    }

    #[test]
    fn map_insertion_order_does_not_matter() {
        let mut first = HashMap::new();
        first.insert("alpha", 1);
        first.insert("beta", 2);
        first.insert("gamma", 3);

        let mut second = HashMap::new();
        second.insert("gamma", 3);
        second.insert("alpha", 1);
        second.insert("beta", 2);

        let ordered: BTreeMap<_, _> = second.iter().map(|(k, v)| (*k, *v)).collect();

        assert_eq!(template_hash(&first), template_hash(&second));
        assert_eq!(template_hash(&first), template_hash(&ordered));
    }

    #[test]
    fn indirection_does_not_change_the_hash() {
        let plain = "payload".to_string();
        let boxed = Box::new(plain.clone());
        let shared = Arc::new(plain.clone());
        let counted = Rc::new(plain.clone());

        let expected = template_hash(&plain);
        assert_eq!(template_hash(&boxed), expected);
        assert_eq!(template_hash(&shared), expected);
        assert_eq!(template_hash(&counted), expected);
    }

    #[test]
    fn label_change_changes_the_hash() {
        let a = deployment_with_labels(&[("app", "store")]);
        let b = deployment_with_labels(&[("app", "store2")]);
        assert_ne!(template_hash(&a), template_hash(&b));
    }

    #[test]
    fn structure_is_part_of_the_encoding() {
        // Same flattened strings, different nesting
        let nested = vec![vec!["a", "b"], vec!["c"]];
        let regrouped = vec![vec!["a"], vec!["b", "c"]];
        assert_ne!(template_hash(&nested), template_hash(&regrouped));

        assert_ne!(template_hash(&Some(0u8)), template_hash(&None::<u8>));
        assert_ne!(template_hash(&"1"), template_hash(&1u32));
        assert_ne!(template_hash(&-1i32), template_hash(&1i32));
    }

    #[derive(Serialize)]
    struct Chain {
        next: Option<Box<Chain>>,
    }

    #[test]
    fn deep_nesting_is_truncated_not_traversed() {
        let mut chain = Chain { next: None };
        for _ in 0..1000 {
            chain = Chain {
                next: Some(Box::new(chain)),
            };
        }
        let first = template_hash(&chain);
        assert_eq!(first, template_hash(&chain));
    }

    struct Loop {
        next: RefCell<Option<Rc<Loop>>>,
    }

    impl Serialize for Loop {
        fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            use serde::ser::SerializeStruct;
            let mut state = serializer.serialize_struct("Loop", 1)?;
            match &*self.next.borrow() {
                Some(next) => state.serialize_field("next", &**next)?,
                None => state.serialize_field("next", &())?,
            }
            state.end()
        }
    }

    #[test]
    fn cyclic_values_terminate() {
        let node = Rc::new(Loop {
            next: RefCell::new(None),
        });
        *node.next.borrow_mut() = Some(node.clone());

        let first = template_hash(&*node);
        let second = template_hash(&*node);
        assert_eq!(first, second);

        // break the cycle so the test does not leak
        *node.next.borrow_mut() = None;
    }

    struct Failing;

    impl Serialize for Failing {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("refuses to serialize"))
        }
    }

    #[test]
    fn serialize_errors_are_folded_into_the_hash() {
        let hash = template_hash(&Failing);
        assert_eq!(hash.len(), 16);
        assert_eq!(hash, template_hash(&Failing));
        assert_ne!(hash, template_hash(&()));
    }

    #[test]
    fn hex_encode_pads_each_byte() {
        assert_eq!(hex_encode(&[0x00, 0x0f, 0xab]), "000fab");
        assert_eq!(hex_encode(&[]), "");
    }

    fn arb_workload() -> impl Strategy<Value = Workload> {
        (
            "[a-z]{1,12}",
            any::<i64>(),
            any::<bool>(),
            prop::collection::btree_map("[a-z]{1,6}", "[a-z0-9]{0,6}", 0..5),
        )
            .prop_map(|(name, replicas, paused, labels)| Workload {
                name,
                replicas,
                paused,
                labels,
            })
    }

    proptest! {
        #[test]
        fn copies_always_hash_identically(workload in arb_workload()) {
            let copy = workload.clone();
            prop_assert_eq!(template_hash(&workload), template_hash(&copy));
        }

        #[test]
        fn any_single_field_change_changes_the_hash(
            workload in arb_workload(),
            field in 0usize..4,
            delta in 1i64..1000,
        ) {
            let mut mutated = workload.clone();
            match field {
                0 => mutated.name.push('x'),
                1 => mutated.replicas = workload.replicas.wrapping_add(delta),
                2 => mutated.paused = !workload.paused,
                _ => {
                    mutated.labels.insert("zz-extra".to_string(), delta.to_string());
                }
            }
            prop_assert_ne!(template_hash(&workload), template_hash(&mutated));
        }
    }
}
