//!
//! The tuple dependency specifications.
//!
//! The second entry tells the forms apart: a kind keyword selects a file specification,
//! while a length or `null` selects a buffer specification. Nothing is read while parsing.
//!

use serde_json::Value;

use crate::dependency::options;
use crate::dependency::Dependency;
use crate::dependency::SourceKind;
use crate::error::Error;

/// The accepted specification forms, appended to every error message.
pub const VALID_FORMATS: &str = r#"

Valid tuple specification formats:

  (filepath:<str>, kind: "ll")
  (filepath:<str>, kind: "hip")
  (filepath:<str>, kind: "hip", opts:<str>|<list>)
  (buffer:<str>|bytes-like, len:<int>|None)
  (buffer:<str>|bytes-like, len:<int>|None, kind:"hip")
  (buffer:<str>|bytes-like, len:<int>|None, kind:"hip", opts:<str>|<list>)
"#;

///
/// Parses a tuple specification.
///
/// | Form | Meaning |
/// |---|---|
/// | `[path, "ll"]` | LLVM IR or bitcode file |
/// | `[path, "hip"]` | HIP C++ file |
/// | `[path, "hip", options]` | HIP C++ file with compiler options |
/// | `[buffer, length]` | LLVM IR or bitcode buffer, `length` may be `null` |
/// | `[buffer, length, "hip"]` | HIP C++ buffer |
/// | `[buffer, length, "hip", options]` | HIP C++ buffer with compiler options |
///
/// A buffer is a string or an array of bytes. Options are a string, split like a shell
/// command line, or an array of strings.
///
pub fn parse(entries: &[Value]) -> anyhow::Result<Dependency> {
    let context = format!(
        "while processing link-time dependency specification '{}'",
        Value::Array(entries.to_vec())
    );
    if entries.len() < 2 {
        return Err(Error::Configuration(format!(
            "{}: must provide tuple with at least two entries.",
            context
        ))
        .into());
    }

    match &entries[1] {
        Value::String(kind) if kind == "ll" || kind == "hip" => parse_file(
            entries,
            kind.parse()?,
            format!("{} (interpreted as file specification): ", context),
        ),
        _ => parse_buffer(
            entries,
            format!("{} (interpreted as buffer specification): ", context),
        ),
    }
}

fn parse_file(entries: &[Value], kind: SourceKind, context: String) -> anyhow::Result<Dependency> {
    let path = match &entries[0] {
        Value::String(path) => path.as_str(),
        _ => return Err(invalid(&context, "tuple entry with index == 0 must be a 'str'.")),
    };

    let (options, max_length) = match kind {
        SourceKind::Hip => (parse_options(entries.get(2), 2, &context)?, 3),
        SourceKind::Llvm => (vec![], 2),
    };
    check_length(entries, max_length, &context)?;

    Dependency::file(path, kind, options)
}

fn parse_buffer(entries: &[Value], context: String) -> anyhow::Result<Dependency> {
    let buffer = parse_bytes(&entries[0], &context)?;
    let length = match &entries[1] {
        Value::Null => None,
        Value::Number(number) => match number.as_u64() {
            Some(length) => Some(length as usize),
            None => {
                return Err(invalid(
                    &context,
                    "tuple entry with index == 1 must be a non-negative 'int'.",
                ))
            }
        },
        _ => {
            return Err(invalid(
                &context,
                "tuple entry with index == 1 must be an 'int' (or 'None').",
            ))
        }
    };

    let name = format!("buffer-{}", &crate::hashes::sha256(buffer.as_slice())[..8]);
    if entries.len() > 2 {
        if entries[2].as_str() != Some(SourceKind::Hip.keyword()) {
            return Err(invalid(
                &context,
                r#"tuple entry with index == 2 must be the literal "hip"."#,
            ));
        }
        let options = parse_options(entries.get(3), 3, &context)?;
        check_length(entries, 4, &context)?;
        Dependency::hip_buffer(name.as_str(), buffer.as_slice(), length, options)
    } else {
        Dependency::buffer(name.as_str(), buffer.as_slice(), length)
    }
}

fn parse_bytes(value: &Value, context: &str) -> anyhow::Result<Vec<u8>> {
    let message = "tuple entry with index == 0 must be a 'str' or bytes-like.";
    match value {
        Value::String(text) => Ok(text.as_bytes().to_vec()),
        Value::Array(bytes) => bytes
            .iter()
            .map(|byte| {
                byte.as_u64()
                    .and_then(|byte| u8::try_from(byte).ok())
                    .ok_or_else(|| invalid(context, message))
            })
            .collect(),
        _ => Err(invalid(context, message)),
    }
}

fn parse_options(value: Option<&Value>, index: usize, context: &str) -> anyhow::Result<Vec<String>> {
    let message = format!(
        "tuple entry with index == {} must be passed as 'str' or 'list'.",
        index
    );
    match value {
        None | Some(Value::Null) => Ok(vec![]),
        Some(Value::String(text)) => options::split(text),
        Some(Value::Array(options)) => options
            .iter()
            .map(|option| {
                option
                    .as_str()
                    .map(str::to_owned)
                    .ok_or_else(|| invalid(context, message.as_str()))
            })
            .collect(),
        Some(_) => Err(invalid(context, message.as_str())),
    }
}

fn check_length(entries: &[Value], max_length: usize, context: &str) -> anyhow::Result<()> {
    if entries.len() > max_length {
        return Err(invalid(
            context,
            format!("too many tuple entries, expected: {}.", max_length).as_str(),
        ));
    }
    Ok(())
}

fn invalid(context: &str, message: &str) -> anyhow::Error {
    Error::Configuration(format!("{}{}{}", context, message, VALID_FORMATS)).into()
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use serde_json::Value;

    use crate::dependency::Dependency;
    use crate::dependency::SourceKind;
    use crate::error::Error;

    fn parse(specification: Value) -> anyhow::Result<Dependency> {
        match specification {
            Value::Array(entries) => super::parse(entries.as_slice()),
            _ => panic!("Expected an array"),
        }
    }

    fn configuration_error(specification: Value) -> String {
        let error = parse(specification).expect_err("Must be rejected");
        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::Configuration(_))
        ));
        error.to_string()
    }

    #[test]
    fn file_forms() {
        let Dependency::File(file) = parse(json!(["kernels.cl", "ll"])).expect("Always valid") else {
            panic!("Expected a file");
        };
        assert_eq!(file.kind, SourceKind::Llvm);

        let Dependency::File(file) =
            parse(json!(["kernels.cpp", "hip", "-DN=4 -I'/opt/x y'"])).expect("Always valid")
        else {
            panic!("Expected a file");
        };
        assert_eq!(file.kind, SourceKind::Hip);
        assert_eq!(file.options, vec!["-DN=4", "-I/opt/x y"]);
    }

    #[test]
    fn file_specification_does_not_touch_the_file_system() {
        assert!(parse(json!(["/does/not/exist.hip", "hip", ["-O3"]])).is_ok());
    }

    #[test]
    fn buffer_forms() {
        let Dependency::Buffer(buffer) =
            parse(json!(["define void @f() {}", null])).expect("Always valid")
        else {
            panic!("Expected a buffer");
        };
        assert_eq!(buffer.kind, SourceKind::Llvm);

        let Dependency::Buffer(buffer) =
            parse(json!([[66, 67, 192, 222, 0], 4, "hip", ["-O1"]])).expect("Always valid")
        else {
            panic!("Expected a buffer");
        };
        assert_eq!(&*buffer.buffer, b"BC\xC0\xDE");
        assert_eq!(buffer.kind, SourceKind::Hip);
        assert_eq!(buffer.options, vec!["-O1"]);
    }

    #[test]
    fn non_integer_length_names_the_expected_type() {
        let message = configuration_error(json!(["__global__ void f() {}", "notanint", "hip"]));
        assert!(message.contains("interpreted as buffer specification"));
        assert!(message.contains("index == 1 must be an 'int'"));
        assert!(message.contains("Valid tuple specification formats"));
    }

    #[test]
    fn malformed_specifications() {
        assert!(configuration_error(json!(["a.ll"])).contains("at least two entries"));
        assert!(configuration_error(json!(["a.ll", "ll", "-O3"])).contains("expected: 2"));
        assert!(configuration_error(json!(["a.hip", "hip", "", 1])).contains("expected: 3"));
        assert!(configuration_error(json!(["src", null, "ll"])).contains(r#"literal "hip""#));
        assert!(configuration_error(json!(["src", null, "hip", 42])).contains("'str' or 'list'"));
        assert!(configuration_error(json!(["src", null, "hip", [], 0])).contains("expected: 4"));
        assert!(configuration_error(json!([42, null])).contains("bytes-like"));
    }
}
