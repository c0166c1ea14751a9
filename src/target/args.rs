use serde::de::DeserializeOwned;

use super::{TargetError, TargetResult};
use crate::protocol::{Kwargs, Value};

/// Arguments of one command invocation, addressable by position or keyword
#[derive(Debug, Clone, Copy)]
pub struct CallArgs<'a> {
    operation: &'a str,
    args: &'a [Value],
    kwargs: &'a Kwargs,
}

impl<'a> CallArgs<'a> {
    pub fn new(operation: &'a str, args: &'a [Value], kwargs: &'a Kwargs) -> Self {
        Self {
            operation,
            args,
            kwargs,
        }
    }

    pub fn operation(&self) -> &'a str {
        self.operation
    }

    pub fn positional(&self) -> &'a [Value] {
        self.args
    }

    /// Raw value at `index` or under `key`; supplying both is an error
    pub fn raw(&self, index: usize, key: &str) -> TargetResult<Option<&'a Value>> {
        match (self.args.get(index), self.kwargs.get(key)) {
            (Some(_), Some(_)) => Err(self.invalid(format!("got multiple values for '{key}'"))),
            (positional, keyword) => Ok(positional.or(keyword)),
        }
    }

    /// Optional argument decoded into `T`
    pub fn get<T: DeserializeOwned>(&self, index: usize, key: &str) -> TargetResult<Option<T>> {
        self.raw(index, key)?
            .map(|value| {
                serde_json::from_value(value.clone())
                    .map_err(|e| self.invalid(format!("argument '{key}': {e}")))
            })
            .transpose()
    }

    /// Required argument decoded into `T`
    pub fn required<T: DeserializeOwned>(&self, index: usize, key: &str) -> TargetResult<T> {
        self.get(index, key)?
            .ok_or_else(|| self.invalid(format!("missing argument '{key}'")))
    }

    /// Required finite number
    pub fn number(&self, index: usize, key: &str) -> TargetResult<f64> {
        let value: f64 = self.required(index, key)?;
        if !value.is_finite() {
            return Err(self.invalid(format!("argument '{key}' must be finite")));
        }
        Ok(value)
    }

    /// Reject surplus positional arguments and unexpected keywords
    pub fn expect_only(&self, keys: &[&str]) -> TargetResult<()> {
        if self.args.len() > keys.len() {
            return Err(self.invalid(format!(
                "takes at most {} positional arguments but {} were given",
                keys.len(),
                self.args.len()
            )));
        }
        if let Some(unexpected) = self.kwargs.keys().find(|k| !keys.contains(&k.as_str())) {
            return Err(self.invalid(format!("unexpected keyword argument '{unexpected}'")));
        }
        Ok(())
    }

    fn invalid(&self, message: String) -> TargetError {
        TargetError::InvalidArgument(format!("{}: {}", self.operation, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kwargs(pairs: &[(&str, Value)]) -> Kwargs {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_positional_or_keyword() {
        let args = vec![json!(3.5)];
        let kw = kwargs(&[("y", json!(4))]);
        let call = CallArgs::new("goto", &args, &kw);

        assert_eq!(call.number(0, "x").unwrap(), 3.5);
        assert_eq!(call.number(1, "y").unwrap(), 4.0);
        assert_eq!(call.get::<f64>(2, "z").unwrap(), None);
    }

    #[test]
    fn test_duplicate_value_rejected() {
        let args = vec![json!(1)];
        let kw = kwargs(&[("x", json!(2))]);
        let call = CallArgs::new("goto", &args, &kw);

        match call.raw(0, "x") {
            Err(TargetError::InvalidArgument(msg)) => {
                assert_eq!(msg, "goto: got multiple values for 'x'")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_missing_and_mistyped() {
        let args = vec![json!("far")];
        let kw = Kwargs::new();
        let call = CallArgs::new("forward", &args, &kw);

        assert!(matches!(call.number(0, "distance"), Err(TargetError::InvalidArgument(_))));
        assert!(matches!(call.number(1, "other"), Err(TargetError::InvalidArgument(msg)) if msg.contains("missing")));
    }

    #[test]
    fn test_expect_only() {
        let args = vec![json!(1), json!(2), json!(3)];
        let kw = Kwargs::new();
        assert!(CallArgs::new("goto", &args, &kw).expect_only(&["x", "y"]).is_err());

        let args = vec![json!(1)];
        let kw = kwargs(&[("color", json!("red"))]);
        let call = CallArgs::new("goto", &args, &kw);
        assert!(call.expect_only(&["x", "y"]).is_err());
        assert!(call.expect_only(&["x", "color"]).is_ok());
    }
}
