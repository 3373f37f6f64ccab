//! Type coercion and string helpers

use genesis_core::error::{EngineError, EngineResult};
use genesis_core::Value;

use super::{arg, arg_int, arg_str};

pub fn int(args: &[Value]) -> EngineResult<Value> {
    arg(args, 0, "Int")?.to_int().map(Value::Int)
}

pub fn float(args: &[Value]) -> EngineResult<Value> {
    Ok(Value::Float(arg(args, 0, "Float")?.to_float()))
}

pub fn money(args: &[Value]) -> EngineResult<Value> {
    arg(args, 0, "Money")?.to_money().map(Value::Money)
}

pub fn str_(args: &[Value]) -> EngineResult<Value> {
    Ok(Value::Str(arg(args, 0, "Str")?.to_display()))
}

pub fn size(args: &[Value]) -> EngineResult<Value> {
    Ok(Value::Int(arg_str(args, 0, "Size")?.len() as i64))
}

/// Substring with clamping: out-of-range or negative offsets yield the
/// empty string rather than failing.
pub fn substr(args: &[Value]) -> EngineResult<Value> {
    let s = arg_str(args, 0, "Substr")?;
    let off = arg_int(args, 1, "Substr")?;
    let slen = arg_int(args, 2, "Substr")?;
    let ilen = s.len() as i64;
    if off < 0 || slen < 0 || off > ilen {
        return Ok(Value::Str(String::new()));
    }
    let start = off as usize;
    let end = if off + slen > ilen {
        s.len()
    } else {
        (off + slen) as usize
    };
    // byte-addressed like the original; never split a char into a panic
    let slice = String::from_utf8_lossy(&s.as_bytes()[start..end]).into_owned();
    Ok(Value::Str(slice))
}

pub fn replace(args: &[Value]) -> EngineResult<Value> {
    let s = arg_str(args, 0, "Replace")?;
    let old = arg_str(args, 1, "Replace")?;
    let new = arg_str(args, 2, "Replace")?;
    if old.is_empty() {
        return Ok(Value::Str(s));
    }
    Ok(Value::Str(s.replace(&old, &new)))
}

pub fn has_prefix(args: &[Value]) -> EngineResult<Value> {
    let s = arg_str(args, 0, "HasPrefix")?;
    let prefix = arg_str(args, 1, "HasPrefix")?;
    Ok(Value::Bool(s.starts_with(&prefix)))
}

pub fn contains(args: &[Value]) -> EngineResult<Value> {
    let s = arg_str(args, 0, "Contains")?;
    let sub = arg_str(args, 1, "Contains")?;
    Ok(Value::Bool(s.contains(&sub)))
}

pub fn join(args: &[Value]) -> EngineResult<Value> {
    let list = match arg(args, 0, "Join")? {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    };
    let sep = arg_str(args, 1, "Join")?;
    Ok(Value::Str(
        list.iter()
            .map(|v| v.to_display())
            .collect::<Vec<_>>()
            .join(&sep),
    ))
}

pub fn split(args: &[Value]) -> EngineResult<Value> {
    let input = arg_str(args, 0, "Split")?;
    let sep = arg_str(args, 1, "Split")?;
    let parts = if sep.is_empty() {
        vec![Value::Str(input)]
    } else {
        input
            .split(&sep)
            .map(|p| Value::Str(p.to_string()))
            .collect()
    };
    Ok(Value::Array(parts))
}

/// Minimal printf: `%s`, `%d`, `%v` and `%f` verbs, `%%` escapes.
pub fn sprintf(args: &[Value]) -> EngineResult<Value> {
    let format = arg_str(args, 0, "Sprintf")?;
    let mut out = String::with_capacity(format.len());
    let mut rest = args.iter().skip(1);
    let mut chars = format.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some('s') | Some('v') => {
                out.push_str(&rest.next().map(|v| v.to_display()).unwrap_or_default())
            }
            Some('d') => {
                let v = rest
                    .next()
                    .ok_or_else(|| EngineError::InvalidObject("Sprintf: missing %d value".into()))?;
                out.push_str(&v.to_int()?.to_string());
            }
            Some('f') => {
                let v = rest.next().map(|v| v.to_float()).unwrap_or(0.0);
                out.push_str(&format!("{:.6}", v));
            }
            other => {
                return Err(EngineError::InvalidObject(format!(
                    "Sprintf: unknown verb %{}",
                    other.map(String::from).unwrap_or_default()
                )))
            }
        }
    }
    Ok(Value::Str(out))
}

pub fn len(args: &[Value]) -> EngineResult<Value> {
    Ok(Value::Int(arg(args, 0, "Len")?.len()))
}

pub fn append(mut args: Vec<Value>) -> EngineResult<Value> {
    if args.len() < 2 {
        return Err(EngineError::InvalidObject("Append needs a list and a value".into()));
    }
    let value = args.pop().unwrap_or(Value::Null);
    let list = args.swap_remove(0);
    let mut items = match list {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    };
    items.push(value);
    Ok(Value::Array(items))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substr_clamps_instead_of_panicking() {
        let s = Value::Str("abcdef".into());
        let call = |off, len| {
            substr(&[s.clone(), Value::Int(off), Value::Int(len)])
                .unwrap()
                .to_display()
        };
        assert_eq!(call(1, 3), "bcd");
        assert_eq!(call(4, 100), "ef");
        assert_eq!(call(-1, 3), "");
        assert_eq!(call(7, 1), "");
        assert_eq!(call(0, -2), "");
    }

    #[test]
    fn sprintf_verbs() {
        let out = sprintf(&[
            Value::Str("%s has %d coins (%f): 100%%".into()),
            Value::Str("alice".into()),
            Value::Int(7),
            Value::Float(1.5),
        ])
        .unwrap();
        assert_eq!(
            out,
            Value::Str("alice has 7 coins (1.500000): 100%".into())
        );
    }

    #[test]
    fn join_and_split_round_trip() {
        let arr = Value::Array(vec![Value::Str("a".into()), Value::Str("b".into())]);
        let joined = join(&[arr, Value::Str(",".into())]).unwrap();
        assert_eq!(joined, Value::Str("a,b".into()));
        let split_back = split(&[joined, Value::Str(",".into())]).unwrap();
        assert_eq!(split_back.len(), 2);
    }

    #[test]
    fn int_rejects_junk() {
        assert!(matches!(
            int(&[Value::Str("12x".into())]),
            Err(EngineError::Conversion(_))
        ));
        assert_eq!(int(&[Value::Str("12".into())]).unwrap(), Value::Int(12));
    }

    #[test]
    fn append_grows_lists() {
        let out = append(vec![
            Value::Array(vec![Value::Int(1)]),
            Value::Int(2),
        ])
        .unwrap();
        assert_eq!(
            out,
            Value::Array(vec![Value::Int(1), Value::Int(2)])
        );
    }
}
