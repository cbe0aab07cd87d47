use std::io::Cursor;

use byteorder::{BigEndian, WriteBytesExt};
use cask_class_file::{
    attributes::{ElementValue, InnerClass},
    AccessFlags, AttributeInfo, ClassFile, ClassFileError, ConstantPool, CpInfo, Parser,
    MAX_NESTING_DEPTH,
};

/// Builds class file bytes by hand.
#[derive(Default)]
struct Assembler(Vec<u8>);
impl Assembler {
    fn u8(&mut self, n: u8) -> &mut Self {
        self.0.write_u8(n).unwrap();
        self
    }

    fn u16(&mut self, n: u16) -> &mut Self {
        self.0.write_u16::<BigEndian>(n).unwrap();
        self
    }

    fn u32(&mut self, n: u32) -> &mut Self {
        self.0.write_u32::<BigEndian>(n).unwrap();
        self
    }

    fn utf8(&mut self, s: &str) -> &mut Self {
        self.utf8_bytes(s.as_bytes())
    }

    fn utf8_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.u8(1).u16(bytes.len() as u16);
        self.0.extend_from_slice(bytes);
        self
    }

    fn class(&mut self, name_index: u16) -> &mut Self {
        self.u8(7).u16(name_index)
    }
}

// Constant pool:
//  1 Utf8 my/MyClass          14 Utf8 Exceptions
//  2 Class #1                 15 Utf8 java/io/IOException
//  3 Utf8 java/lang/Object    16 Class #15
//  4 Class #3                 17 Utf8 InnerClasses
//  5 Utf8 myField             18 Utf8 my/MyClass$Inner
//  6 Utf8 I                   19 Class #18
//  7 Utf8 <init>              20 Utf8 Inner
//  8 Utf8 ()V                 21 Utf8 SourceFile
//  9 Utf8 add                 22 Utf8 MyClass.java
// 10 Utf8 (I)F                23 Long 7 (and 24)
// 11 Utf8 Code                25 Utf8 RuntimeVisibleAnnotations
// 12 Utf8 ConstantValue       26 Utf8 Ljava/lang/Deprecated;
// 13 Integer 42
fn my_class_bytes() -> Vec<u8> {
    let mut a = Assembler::default();
    a.u32(0xCAFEBABE).u16(0).u16(61);

    a.u16(27);
    a.utf8("my/MyClass").class(1);
    a.utf8("java/lang/Object").class(3);
    a.utf8("myField").utf8("I");
    a.utf8("<init>").utf8("()V");
    a.utf8("add").utf8("(I)F");
    a.utf8("Code").utf8("ConstantValue");
    a.u8(3).u32(42);
    a.utf8("Exceptions").utf8("java/io/IOException").class(15);
    a.utf8("InnerClasses").utf8("my/MyClass$Inner").class(18);
    a.utf8("Inner");
    a.utf8("SourceFile").utf8("MyClass.java");
    a.u8(5).u32(0).u32(7);
    a.utf8("RuntimeVisibleAnnotations").utf8("Ljava/lang/Deprecated;");

    // access flags, this, super, interfaces
    a.u16(0x0021).u16(2).u16(4).u16(0);

    // fields
    a.u16(1);
    a.u16(0x0012).u16(5).u16(6);
    a.u16(1).u16(12).u32(2).u16(13);

    // methods
    a.u16(2);
    a.u16(0x0001).u16(7).u16(8);
    a.u16(1).u16(11).u32(14);
    a.u16(1).u16(1).u32(2).u8(0x2a).u8(0xb1).u16(0).u16(0);

    a.u16(0x0001).u16(9).u16(10);
    a.u16(2);
    a.u16(14).u32(4).u16(1).u16(16);
    a.u16(25).u32(6).u16(1).u16(26).u16(0);

    // class attributes
    a.u16(2);
    a.u16(21).u32(2).u16(22);
    a.u16(17).u32(10).u16(1).u16(19).u16(2).u16(20).u16(0x0009);

    a.0
}

fn with_class_file(f: impl FnOnce(ClassFile)) {
    f(Parser::new(Cursor::new(my_class_bytes())).parse().unwrap());
}

#[test]
fn test_super_class() {
    with_class_file(|class_file| {
        assert_eq!(Some("java/lang/Object"), class_file.super_class().unwrap())
    });
}

#[test]
fn test_no_super_class() {
    with_class_file(|mut class_file| {
        class_file.super_class = 0;
        assert_eq!(None, class_file.super_class().unwrap())
    });
}

#[test]
fn test_class_name() {
    with_class_file(|class_file| assert_eq!("my/MyClass", class_file.class_name().unwrap()));
}

#[test]
fn test_class_name_not_a_class() {
    with_class_file(|mut class_file| {
        class_file.this_class = 1;
        assert!(matches!(
            class_file.class_name(),
            Err(ClassFileError::UnexpectedConstantPoolEntry("Class", CpInfo::Utf8(_)))
        ))
    });
}

#[test]
fn test_version() {
    with_class_file(|class_file| {
        assert_eq!((61, 0), (class_file.major_version, class_file.minor_version))
    });
}

#[test]
fn test_field_name() {
    with_class_file(|class_file| {
        assert_eq!(
            "myField",
            class_file.field_name(&class_file.fields[0]).unwrap()
        )
    });
}

#[test]
fn test_int_field_type() {
    with_class_file(|class_file| {
        assert_eq!(
            "I",
            class_file.field_descriptor(&class_file.fields[0]).unwrap()
        )
    });
}

#[test]
fn test_field_access_flags() {
    with_class_file(|class_file| {
        assert_eq!(
            AccessFlags::FINAL | AccessFlags::PRIVATE,
            class_file.fields[0].access_flags
        )
    });
}

#[test]
fn test_constructor_name() {
    with_class_file(|class_file| {
        assert_eq!(
            "<init>",
            class_file.method_name(&class_file.methods[0]).unwrap()
        )
    });
}

#[test]
fn test_constructor_descriptor() {
    with_class_file(|class_file| {
        assert_eq!(
            "()V",
            class_file
                .method_descriptor(&class_file.methods[0])
                .unwrap()
        )
    });
}

#[test]
fn test_method_name() {
    with_class_file(|class_file| {
        assert_eq!(
            "add",
            class_file.method_name(&class_file.methods[1]).unwrap()
        )
    });
}

#[test]
fn test_method_descriptor() {
    with_class_file(|class_file| {
        assert_eq!(
            "(I)F",
            class_file
                .method_descriptor(&class_file.methods[1])
                .unwrap()
        )
    });
}

#[test]
fn test_method_access_flags() {
    with_class_file(|class_file| {
        assert_eq!(AccessFlags::PUBLIC, class_file.methods[1].access_flags)
    });
}

#[test]
fn test_long_takes_two_slots() {
    with_class_file(|class_file| {
        let pool = &class_file.constant_pool;
        assert_eq!(27, pool.size());
        assert_eq!(&CpInfo::Long(7), pool.get(23).unwrap());
        assert_eq!(&CpInfo::Unusable, pool.get(24).unwrap());
        assert_eq!(
            "RuntimeVisibleAnnotations",
            pool.get_utf8(25).unwrap()
        );
    });
}

#[test]
fn test_constant_value_attribute() {
    with_class_file(|class_file| {
        assert_eq!(
            AttributeInfo::ConstantValue {
                constant_value_index: 13
            },
            class_file.fields[0].attributes.0[0].info
        )
    });
}

#[test]
fn test_code_attribute() {
    with_class_file(|class_file| {
        let code = class_file.methods[0]
            .attributes
            .code_attribute(&class_file.constant_pool)
            .unwrap();

        assert_eq!(1, code.max_stack);
        assert_eq!(1, code.max_locals);
        assert_eq!(vec![0x2a, 0xb1], code.code);
        assert!(code.exception_table.is_empty());
        assert!(code.attributes.0.is_empty());
    });
}

#[test]
fn test_exceptions_attribute() {
    with_class_file(|class_file| {
        let exceptions = class_file.methods[1]
            .attributes
            .find_by_name("Exceptions", &class_file.constant_pool)
            .unwrap();

        assert_eq!(AttributeInfo::Exceptions(vec![16]), exceptions.info);
    });
}

#[test]
fn test_annotations_attribute() {
    with_class_file(|class_file| {
        let annotations = class_file.methods[1]
            .attributes
            .find_by_name("RuntimeVisibleAnnotations", &class_file.constant_pool)
            .unwrap();

        let AttributeInfo::Annotations(ref annotations) = annotations.info else {
            panic!("expected annotations, found {:?}", annotations.info);
        };
        assert_eq!(1, annotations.len());
        assert_eq!(26, annotations[0].type_index);
        assert!(annotations[0].element_value_pairs.is_empty());
    });
}

#[test]
fn test_inner_classes_attribute() {
    with_class_file(|class_file| {
        let inner_classes = class_file
            .attributes
            .find_by_name("InnerClasses", &class_file.constant_pool)
            .unwrap();

        assert_eq!(
            AttributeInfo::InnerClasses(vec![InnerClass {
                inner_class_info_index: 19,
                outer_class_info_index: 2,
                inner_name_index: 20,
                inner_class_access_flags: AccessFlags::PUBLIC | AccessFlags::STATIC,
            }]),
            inner_classes.info
        );
    });
}

#[test]
fn test_source_file_kept_raw() {
    with_class_file(|class_file| {
        let source_file = class_file
            .attributes
            .find_by_name("SourceFile", &class_file.constant_pool)
            .unwrap();

        assert_eq!(AttributeInfo::Raw(vec![0, 22]), source_file.info);
    });
}

#[test]
fn test_attributes_valid() {
    with_class_file(|class_file| {
        assert_eq!(Ok(()), class_file.validate_attributes());
        assert!(class_file.invalid_attributes().is_empty());
    });
}

#[test]
fn test_invalid_field_attribute_located() {
    with_class_file(|mut class_file| {
        class_file.fields[0].attributes.0[0].info = AttributeInfo::ConstantValue {
            constant_value_index: 2,
        };

        let invalid = class_file.invalid_attributes();
        assert_eq!(1, invalid.len());
        assert_eq!(cask_class_file::AttributeLocation::Field(0), invalid[0].0);
        assert!(class_file.validate_attributes().is_err());
    });
}

#[test]
fn test_write_reproduces_input() {
    let bytes = my_class_bytes();
    let class_file = ClassFile::parse(Cursor::new(bytes.clone())).unwrap();

    let mut written = Vec::new();
    class_file.write(&mut written).unwrap();

    assert_eq!(bytes, written);
}

#[test]
fn test_invalid_magic_identifier() {
    let mut bytes = my_class_bytes();
    bytes[0] = 0xCB;

    assert!(matches!(
        ClassFile::parse(Cursor::new(bytes)),
        Err(ClassFileError::InvalidMagicIdentifier(0xCBFEBABE))
    ));
}

#[test]
fn test_invalid_cp_info_tag() {
    let mut a = Assembler::default();
    a.u32(0xCAFEBABE).u16(0).u16(61).u16(2).u8(2);

    assert!(matches!(
        ClassFile::parse(Cursor::new(a.0)),
        Err(ClassFileError::InvalidCpInfoTag(2))
    ));
}

#[test]
fn test_truncated_attribute_kept_raw() {
    let mut pool = ConstantPool::default();
    let name_index = pool.push(CpInfo::Utf8("NestHost".to_owned())).unwrap();

    let mut a = Assembler::default();
    a.u16(name_index).u32(1).u8(0);
    let attribute = Parser::new(Cursor::new(a.0))
        .parse_attribute(&pool)
        .unwrap();

    assert_eq!(AttributeInfo::Raw(vec![0]), attribute.info);
}

#[test]
fn test_trailing_bytes_kept_raw() {
    let mut pool = ConstantPool::default();
    let name_index = pool.push(CpInfo::Utf8("EnclosingMethod".to_owned())).unwrap();

    let mut a = Assembler::default();
    a.u16(name_index).u32(5).u16(1).u16(0).u8(9);
    let attribute = Parser::new(Cursor::new(a.0))
        .parse_attribute(&pool)
        .unwrap();

    assert_eq!(AttributeInfo::Raw(vec![0, 1, 0, 0, 9]), attribute.info);
}

#[test]
fn test_unnamed_attribute_kept_raw() {
    let pool = ConstantPool::default();

    let mut a = Assembler::default();
    a.u16(7).u32(2).u16(1);
    let attribute = Parser::new(Cursor::new(a.0))
        .parse_attribute(&pool)
        .unwrap();

    assert_eq!(7, attribute.name_index);
    assert_eq!(AttributeInfo::Raw(vec![0, 1]), attribute.info);
}

#[test]
fn test_push_stops_at_max_pool_size() {
    let mut pool = ConstantPool::new(vec![CpInfo::Integer(0); 65533]);
    assert_eq!(65534, pool.size());

    assert!(matches!(
        pool.push(CpInfo::Long(1)),
        Err(ClassFileError::LengthOverflow(65536))
    ));
    assert_eq!(65534, pool.push(CpInfo::Integer(1)).unwrap());
    assert_eq!(65535, pool.size());
    assert!(matches!(
        pool.push(CpInfo::Integer(2)),
        Err(ClassFileError::LengthOverflow(65536))
    ));
    assert_eq!(65535, pool.size());
}

// An empty class whose pool holds `utf8` at index 3.
fn class_with_utf8(utf8: &[u8]) -> Vec<u8> {
    let mut a = Assembler::default();
    a.u32(0xCAFEBABE).u16(0).u16(61);
    a.u16(4).utf8("my/MyClass").class(1).utf8_bytes(utf8);
    a.u16(0x0021).u16(2).u16(0).u16(0).u16(0).u16(0).u16(0);
    a.0
}

#[test]
fn test_modified_utf8_round_trip() {
    let cases: [(&[u8], &str); 3] = [
        (b"a\xC0\x80b", "a\u{0}b"),
        (b"\xED\xA0\xBD\xED\xB8\x80", "\u{1F600}"),
        ("caf\u{e9}".as_bytes(), "caf\u{e9}"),
    ];

    for (encoded, decoded) in cases {
        let bytes = class_with_utf8(encoded);
        let class_file = ClassFile::parse(Cursor::new(bytes.clone())).unwrap();
        assert_eq!(decoded, class_file.constant_pool.get_utf8(3).unwrap());

        let mut written = Vec::new();
        class_file.write(&mut written).unwrap();
        assert_eq!(bytes, written);
    }
}

#[test]
fn test_invalid_modified_utf8() {
    assert!(matches!(
        ClassFile::parse(Cursor::new(class_with_utf8(b"a\xFFb"))),
        Err(ClassFileError::InvalidModifiedUtf8(_))
    ));
}

// AnnotationDefault payload of `depth` arrays nested around a single int.
fn nested_arrays(depth: usize) -> Vec<u8> {
    let mut a = Assembler::default();
    for _ in 0..depth {
        a.u8(b'[').u16(1);
    }
    a.u8(b'I').u16(3);
    a.0
}

fn parse_annotation_default(payload: &[u8]) -> AttributeInfo {
    let mut pool = ConstantPool::default();
    let name_index = pool
        .push(CpInfo::Utf8("AnnotationDefault".to_owned()))
        .unwrap();

    let mut a = Assembler::default();
    a.u16(name_index).u32(payload.len() as u32);
    a.0.extend_from_slice(payload);
    Parser::new(Cursor::new(a.0))
        .parse_attribute(&pool)
        .unwrap()
        .info
}

#[test]
fn test_nested_arrays_within_limit() {
    let payload = nested_arrays(MAX_NESTING_DEPTH);
    let AttributeInfo::AnnotationDefault(mut value) = parse_annotation_default(&payload) else {
        panic!("expected a typed AnnotationDefault");
    };

    let mut depth = 0;
    while let ElementValue::Array(mut values) = value {
        assert_eq!(1, values.len());
        value = values.remove(0);
        depth += 1;
    }
    assert_eq!(MAX_NESTING_DEPTH, depth);
}

#[test]
fn test_deeply_nested_arrays_kept_raw() {
    for depth in [MAX_NESTING_DEPTH + 1, 200_000] {
        let payload = nested_arrays(depth);

        assert_eq!(AttributeInfo::Raw(payload.clone()), parse_annotation_default(&payload));
    }
}

#[test]
fn test_deeply_nested_code_kept_raw() {
    let mut pool = ConstantPool::default();
    let name_index = pool.push(CpInfo::Utf8("Code".to_owned())).unwrap();

    // max_stack, max_locals, `return`, no handlers
    let code_header = |a: &mut Assembler| {
        a.u16(1).u16(1).u32(1).u8(0xb1).u16(0);
    };
    let mut a = Assembler::default();
    code_header(&mut a);
    a.u16(0);
    let mut payload = a.0;
    for _ in 0..MAX_NESTING_DEPTH + 10 {
        let mut a = Assembler::default();
        code_header(&mut a);
        a.u16(1).u16(name_index).u32(payload.len() as u32);
        a.0.extend_from_slice(&payload);
        payload = a.0;
    }

    let mut a = Assembler::default();
    a.u16(name_index).u32(payload.len() as u32);
    a.0.extend_from_slice(&payload);
    let mut info = Parser::new(Cursor::new(a.0))
        .parse_attribute(&pool)
        .unwrap()
        .info;

    let mut typed_levels = 0;
    let innermost = loop {
        match info {
            AttributeInfo::Code(mut code) => {
                typed_levels += 1;
                info = code.attributes.0.pop().unwrap().info;
            }
            other => break other,
        }
    };
    assert_eq!(MAX_NESTING_DEPTH, typed_levels);
    assert!(matches!(innermost, AttributeInfo::Raw(_)));
}
