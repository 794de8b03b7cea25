//! Resource fixtures shared by unit tests.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use mxgate_core::{
    Introspectable, ManagedResource, ObjectRef, OperationSet, OperationSignature, ResourceName,
    Value, VOID_TYPE,
};

pub fn name(s: &str) -> ResourceName {
    ResourceName::parse(s).unwrap()
}

/// Introspectable, invocable test object.
///
/// Scalars are fixed at construction; `links` can be set once afterwards so
/// tests can build self-referencing and mutually cyclic graphs.
pub struct Bean {
    type_name: String,
    identity: Option<ResourceName>,
    scalars: Vec<(String, Value)>,
    links: OnceLock<Vec<(String, ObjectRef)>>,
    operations: OperationSet,
}

impl Bean {
    /// Bean with scalar properties and no operations.
    pub fn scalars(type_name: &str, scalars: Vec<(&str, Value)>) -> Self {
        Self {
            type_name: type_name.to_string(),
            identity: None,
            scalars: scalars
                .into_iter()
                .map(|(n, v)| (n.to_string(), v))
                .collect(),
            links: OnceLock::new(),
            operations: OperationSet::new(),
        }
    }

    /// Bean exposing the fixture operations (see [`fixture_operations`]).
    pub fn service(type_name: &str) -> Self {
        Self {
            operations: fixture_operations(),
            ..Self::scalars(type_name, vec![("state", Value::from("idle"))])
        }
    }

    #[must_use]
    pub fn identified(mut self, identity: &str) -> Self {
        self.identity = Some(name(identity));
        self
    }

    /// Sets object-valued properties. Only the first call has effect.
    pub fn link(&self, links: Vec<(&str, ObjectRef)>) {
        let _ = self
            .links
            .set(links.into_iter().map(|(n, o)| (n.to_string(), o)).collect());
    }
}

impl Introspectable for Bean {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn property_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.scalars.iter().map(|(n, _)| n.clone()).collect();
        if let Some(links) = self.links.get() {
            names.extend(links.iter().map(|(n, _)| n.clone()));
        }
        names
    }

    fn property_value(&self, name: &str) -> anyhow::Result<Value> {
        if let Some((_, v)) = self.scalars.iter().find(|(n, _)| n == name) {
            return Ok(v.clone());
        }
        self.links
            .get()
            .and_then(|links| links.iter().find(|(n, _)| n == name))
            .map(|(_, o)| Value::Object(Arc::clone(o)))
            .ok_or_else(|| anyhow::anyhow!("no property {name}"))
    }

    fn resource_name(&self) -> Option<ResourceName> {
        self.identity.clone()
    }
}

impl ManagedResource for Bean {
    fn operations(&self) -> &OperationSet {
        &self.operations
    }

    fn invoke(&self, signature: &OperationSignature, args: Vec<Value>) -> anyhow::Result<Value> {
        let text = |i: usize| args.get(i).and_then(Value::as_text).unwrap_or_default().to_string();
        match (signature.name.as_str(), args.as_slice()) {
            ("add", [Value::Int(a), Value::Int(b)]) => Ok(Value::Int(a + b)),
            ("sleep", [Value::Long(ms)]) => {
                std::thread::sleep(Duration::from_millis(u64::try_from(*ms).unwrap_or(0)));
                Ok(Value::Null)
            }
            ("fail", []) => anyhow::bail!("fixture failure"),
            ("big", [Value::Int(n)]) => Ok(Value::Text("x".repeat(usize::try_from(*n).unwrap_or(0)))),
            ("echo", [Value::Int(v)]) => Ok(Value::Text(format!("int:{v}"))),
            ("echo", [Value::Text(_)]) => Ok(Value::Text(format!("string:{}", text(0)))),
            ("noop", []) => Ok(Value::Null),
            ("describe", []) => Ok(Value::object(Bean::scalars(
                "Summary",
                vec![("count", Value::Int(2)), ("label", Value::from("summary"))],
            ))),
            (other, _) => anyhow::bail!("fixture has no operation {other}"),
        }
    }
}

/// Operations exposed by [`Bean::service`]:
/// `add(int,int)`, `sleep(long)`, `fail()`, `big(int)`, `echo(int)`,
/// `echo(string)`, `noop()` and `describe()`.
pub fn fixture_operations() -> OperationSet {
    let ops = [
        OperationSignature::new("add", "int").param("a", "int").param("b", "int"),
        OperationSignature::new("sleep", VOID_TYPE).param("ms", "long"),
        OperationSignature::new("fail", "string"),
        OperationSignature::new("big", "string").param("n", "int"),
        OperationSignature::new("echo", "string").param("v", "int"),
        OperationSignature::new("echo", "string").param("v", "string"),
        OperationSignature::new("noop", VOID_TYPE),
        OperationSignature::new("describe", "Summary"),
    ];
    let mut set = OperationSet::new();
    for op in ops {
        set.add(op).unwrap();
    }
    set
}

/// Root with two scalars and a child whose `me` property points at itself.
pub fn self_referencing() -> Arc<Bean> {
    let child = Arc::new(Bean::scalars("Child", vec![("label", Value::from("child"))]));
    child.link(vec![("me", child.clone() as ObjectRef)]);
    let root = Arc::new(Bean::scalars(
        "Root",
        vec![("port", Value::Int(8080)), ("host", Value::from("localhost"))],
    ));
    root.link(vec![("child", child as ObjectRef)]);
    root
}
