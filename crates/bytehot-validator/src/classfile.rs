//! Minimal JVM class file structural parser (JVMS §4).
//!
//! Extracts exactly the metadata redefinition compatibility decisions need —
//! class name, superclass, interfaces, field and method descriptors, class-level access
//! flags, and the format's own schema version — without resolving constant
//! pool entries beyond what is needed to print names, and without
//! interpreting any method body. A pure function of the input bytes:
//! malformed input always produces [`ClassFileError`], never a panic.

use std::fmt;

use thiserror::Error;

/// A parsed method or field descriptor pair, enough to detect additions,
/// removals and signature changes without inspecting the code attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDescriptor {
    /// Member name, e.g. `"doWork"`.
    pub name: String,
    /// Field or method descriptor, e.g. `"(I)V"` or `"I"`.
    pub descriptor: String,
    /// `access_flags` as stored in the class file.
    pub access_flags: u16,
}

impl fmt::Display for MemberDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.descriptor)
    }
}

/// Structural metadata extracted from a class file, sufficient to decide
/// redefinition compatibility without loading the class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMetadata {
    /// Class file format major version (JVMS Table 4.1-A).
    pub major_version: u16,
    /// Class file format minor version.
    pub minor_version: u16,
    /// Class-level access flags.
    pub access_flags: u16,
    /// Fully-qualified internal class name (`/`-separated).
    pub class_name: String,
    /// Fully-qualified internal superclass name, absent only for
    /// `java/lang/Object`.
    pub superclass: Option<String>,
    /// Fully-qualified internal names of directly implemented interfaces.
    pub interfaces: Vec<String>,
    /// Declared fields.
    pub fields: Vec<MemberDescriptor>,
    /// Declared methods.
    pub methods: Vec<MemberDescriptor>,
}

/// Errors parsing a class file, surfaced as a single `Violation::Malformed`
/// at the validator boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassFileError {
    /// Fewer bytes remained than the structure being read required.
    #[error("unexpected end of class file while reading {0}")]
    Truncated(&'static str),
    /// The four-byte magic number was not `0xCAFEBABE`.
    #[error("bad magic number: {0:#010x}")]
    BadMagic(u32),
    /// A constant pool index pointed outside the pool or at the wrong tag.
    #[error("unresolvable constant pool index {index} ({context})")]
    UnresolvableConstant {
        /// The offending index.
        index: u16,
        /// What the reader was trying to resolve it as.
        context: &'static str,
    },
    /// `this_class` did not point at a `CONSTANT_Class` entry.
    #[error("this_class does not reference a valid CONSTANT_Class entry")]
    InvalidThisClass,
}

/// A forward-only, bounds-checked cursor over class file bytes.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn u1(&mut self, what: &'static str) -> Result<u8, ClassFileError> {
        let b = *self.bytes.get(self.pos).ok_or(ClassFileError::Truncated(what))?;
        self.pos += 1;
        Ok(b)
    }

    fn u2(&mut self, what: &'static str) -> Result<u16, ClassFileError> {
        let hi = self.u1(what)? as u16;
        let lo = self.u1(what)? as u16;
        Ok((hi << 8) | lo)
    }

    fn u4(&mut self, what: &'static str) -> Result<u32, ClassFileError> {
        let hi = self.u2(what)? as u32;
        let lo = self.u2(what)? as u32;
        Ok((hi << 16) | lo)
    }

    fn skip(&mut self, n: usize, what: &'static str) -> Result<(), ClassFileError> {
        if self.pos + n > self.bytes.len() {
            return Err(ClassFileError::Truncated(what));
        }
        self.pos += n;
        Ok(())
    }

    fn bytes_owned(&mut self, n: usize, what: &'static str) -> Result<Vec<u8>, ClassFileError> {
        if self.pos + n > self.bytes.len() {
            return Err(ClassFileError::Truncated(what));
        }
        let slice = self.bytes[self.pos..self.pos + n].to_vec();
        self.pos += n;
        Ok(slice)
    }
}

/// One resolved constant pool entry, reduced to what this parser needs.
#[derive(Debug, Clone)]
enum Constant {
    Utf8(String),
    Class { name_index: u16 },
    /// Any other tag: carries no data this parser cares about, but still
    /// occupies a slot (and, for Long/Double, the following slot too).
    Other,
}

const TAG_UTF8: u8 = 1;
const TAG_INTEGER: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_LONG: u8 = 5;
const TAG_DOUBLE: u8 = 6;
const TAG_CLASS: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_FIELDREF: u8 = 9;
const TAG_METHODREF: u8 = 10;
const TAG_INTERFACE_METHODREF: u8 = 11;
const TAG_NAME_AND_TYPE: u8 = 12;
const TAG_METHOD_HANDLE: u8 = 15;
const TAG_METHOD_TYPE: u8 = 16;
const TAG_DYNAMIC: u8 = 17;
const TAG_INVOKE_DYNAMIC: u8 = 18;
const TAG_MODULE: u8 = 19;
const TAG_PACKAGE: u8 = 20;

/// Parse the constant pool and structural header of a class file (JVMS §4),
/// returning its [`ClassMetadata`].
pub fn parse(bytecode: &[u8]) -> Result<ClassMetadata, ClassFileError> {
    let mut cursor = Cursor::new(bytecode);

    let magic = cursor.u4("magic")?;
    if magic != 0xCAFE_BABE {
        return Err(ClassFileError::BadMagic(magic));
    }
    let minor_version = cursor.u2("minor_version")?;
    let major_version = cursor.u2("major_version")?;

    let constant_pool_count = cursor.u2("constant_pool_count")?;
    // Slot 0 is unused; entries are 1-indexed, and Long/Double occupy two
    // slots (JVMS §4.4.5).
    let mut pool: Vec<Option<Constant>> = vec![None; constant_pool_count as usize];
    let mut index = 1usize;
    while index < constant_pool_count as usize {
        let tag = cursor.u1("constant_pool tag")?;
        let constant = match tag {
            TAG_UTF8 => {
                let length = cursor.u2("Utf8 length")? as usize;
                let raw = cursor.bytes_owned(length, "Utf8 bytes")?;
                Constant::Utf8(String::from_utf8_lossy(&raw).into_owned())
            }
            TAG_CLASS | TAG_STRING | TAG_METHOD_TYPE | TAG_MODULE | TAG_PACKAGE => {
                let name_index = cursor.u2("Class/String-like name_index")?;
                if tag == TAG_CLASS {
                    Constant::Class { name_index }
                } else {
                    Constant::Other
                }
            }
            TAG_FIELDREF | TAG_METHODREF | TAG_INTERFACE_METHODREF | TAG_NAME_AND_TYPE
            | TAG_DYNAMIC | TAG_INVOKE_DYNAMIC => {
                cursor.skip(4, "two-u2 constant")?;
                Constant::Other
            }
            TAG_INTEGER | TAG_FLOAT => {
                cursor.skip(4, "Integer/Float bytes")?;
                Constant::Other
            }
            TAG_LONG | TAG_DOUBLE => {
                cursor.skip(8, "Long/Double bytes")?;
                pool[index] = Some(Constant::Other);
                index += 2; // occupies the following slot too
                continue;
            }
            TAG_METHOD_HANDLE => {
                cursor.skip(3, "MethodHandle bytes")?;
                Constant::Other
            }
            other => {
                return Err(ClassFileError::UnresolvableConstant {
                    index: other as u16,
                    context: "unknown constant pool tag",
                });
            }
        };
        pool[index] = Some(constant);
        index += 1;
    }

    let resolve_utf8 = |pool: &[Option<Constant>], idx: u16, context: &'static str| -> Result<String, ClassFileError> {
        match pool.get(idx as usize) {
            Some(Some(Constant::Utf8(s))) => Ok(s.clone()),
            _ => Err(ClassFileError::UnresolvableConstant { index: idx, context }),
        }
    };
    let resolve_class_name = |pool: &[Option<Constant>], idx: u16| -> Result<String, ClassFileError> {
        match pool.get(idx as usize) {
            Some(Some(Constant::Class { name_index })) => resolve_utf8(pool, *name_index, "class name"),
            _ => Err(ClassFileError::UnresolvableConstant {
                index: idx,
                context: "CONSTANT_Class",
            }),
        }
    };

    let access_flags = cursor.u2("access_flags")?;
    let this_class_index = cursor.u2("this_class")?;
    let class_name = resolve_class_name(&pool, this_class_index).map_err(|_| ClassFileError::InvalidThisClass)?;
    let super_class_index = cursor.u2("super_class")?;
    let superclass = if super_class_index == 0 {
        None
    } else {
        Some(resolve_class_name(&pool, super_class_index)?)
    };

    let interfaces_count = cursor.u2("interfaces_count")?;
    let mut interfaces = Vec::with_capacity(interfaces_count as usize);
    for _ in 0..interfaces_count {
        let idx = cursor.u2("interface index")?;
        interfaces.push(resolve_class_name(&pool, idx)?);
    }

    let fields = parse_members(&mut cursor, &pool, &resolve_utf8, "field")?;
    let methods = parse_members(&mut cursor, &pool, &resolve_utf8, "method")?;
    // Class-level attributes follow; validator needs none of their
    // contents, so they are skipped rather than parsed.
    skip_attributes(&mut cursor, "class attribute")?;

    Ok(ClassMetadata {
        major_version,
        minor_version,
        access_flags,
        class_name,
        superclass,
        interfaces,
        fields,
        methods,
    })
}

fn parse_members(
    cursor: &mut Cursor<'_>,
    pool: &[Option<Constant>],
    resolve_utf8: &impl Fn(&[Option<Constant>], u16, &'static str) -> Result<String, ClassFileError>,
    kind: &'static str,
) -> Result<Vec<MemberDescriptor>, ClassFileError> {
    let count = cursor.u2(if kind == "field" { "fields_count" } else { "methods_count" })?;
    let mut members = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let access_flags = cursor.u2("member access_flags")?;
        let name_index = cursor.u2("member name_index")?;
        let descriptor_index = cursor.u2("member descriptor_index")?;
        let name = resolve_utf8(pool, name_index, "member name")?;
        let descriptor = resolve_utf8(pool, descriptor_index, "member descriptor")?;
        skip_attributes(cursor, "member attribute")?;
        members.push(MemberDescriptor {
            name,
            descriptor,
            access_flags,
        });
    }
    Ok(members)
}

fn skip_attributes(cursor: &mut Cursor<'_>, what: &'static str) -> Result<(), ClassFileError> {
    let count = cursor.u2("attributes_count")?;
    for _ in 0..count {
        cursor.skip(2, "attribute_name_index")?;
        let length = cursor.u4("attribute_length")? as usize;
        cursor.skip(length, what)?;
    }
    Ok(())
}
