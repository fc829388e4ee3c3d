use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::store::{ObjectStore, Payload};
use crate::engine::{EngineError, EngineHandle, EngineResult};
use crate::types::SemanticTag;

/// A value held by an operator pin inside the engine
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Bool(bool),
    Int(i32),
    Double(f64),
    String(String),
    /// Holds one reference to the object
    Object(SemanticTag, EngineHandle),
}

impl Slot {
    pub fn describe(&self) -> String {
        match self {
            Slot::Bool(_) => "bool".to_string(),
            Slot::Int(_) => "int32".to_string(),
            Slot::Double(_) => "double".to_string(),
            Slot::String(_) => "string".to_string(),
            Slot::Object(tag, _) => tag.to_string(),
        }
    }

    pub fn object(&self) -> Option<(SemanticTag, EngineHandle)> {
        match self {
            Slot::Object(tag, handle) => Some((*tag, *handle)),
            _ => None,
        }
    }
}

pub type KernelFn = Arc<dyn Fn(&mut KernelContext<'_>) -> EngineResult<()> + Send + Sync>;

/// Inputs and object store handed to a kernel for one evaluation
pub struct KernelContext<'a> {
    operator: &'a str,
    store: &'a mut ObjectStore,
    handles: &'a AtomicUsize,
    inputs: &'a BTreeMap<i32, Slot>,
    config: &'a HashMap<String, String>,
    outputs: BTreeMap<i32, Slot>,
}

impl<'a> KernelContext<'a> {
    pub fn new(
        operator: &'a str,
        store: &'a mut ObjectStore,
        handles: &'a AtomicUsize,
        inputs: &'a BTreeMap<i32, Slot>,
        config: &'a HashMap<String, String>,
    ) -> Self {
        Self {
            operator,
            store,
            handles,
            inputs,
            config,
            outputs: BTreeMap::new(),
        }
    }

    pub fn operator_name(&self) -> &str {
        self.operator
    }

    pub fn store(&self) -> &ObjectStore {
        self.store
    }

    pub fn config_option(&self, option: &str) -> Option<&str> {
        self.config.get(option).map(String::as_str)
    }

    pub fn input(&self, pin: i32) -> Option<&Slot> {
        self.inputs.get(&pin)
    }

    /// Inputs bound at `from_pin` and above, in pin order
    pub fn inputs_from(&self, from_pin: i32) -> Vec<(i32, Slot)> {
        self.inputs
            .range(from_pin..)
            .map(|(pin, slot)| (*pin, slot.clone()))
            .collect()
    }

    pub fn require(&self, pin: i32) -> EngineResult<&Slot> {
        self.inputs.get(&pin).ok_or_else(|| {
            EngineError::evaluation(format!(
                "{}: input pin {} is not connected",
                self.operator, pin
            ))
        })
    }

    pub fn input_object(&self, pin: i32, tag: SemanticTag) -> EngineResult<EngineHandle> {
        match self.require(pin)? {
            Slot::Object(actual, handle) if *actual == tag => Ok(*handle),
            other => Err(EngineError::type_mismatch(format!(
                "{}: input pin {} expects {}, got {}",
                self.operator,
                pin,
                tag,
                other.describe()
            ))),
        }
    }

    pub fn input_bool_or(&self, pin: i32, default: bool) -> EngineResult<bool> {
        match self.input(pin) {
            None => Ok(default),
            Some(Slot::Bool(b)) => Ok(*b),
            Some(other) => Err(EngineError::type_mismatch(format!(
                "{}: input pin {} expects bool, got {}",
                self.operator,
                pin,
                other.describe()
            ))),
        }
    }

    pub fn new_object(&mut self, tag: SemanticTag, payload: Payload) -> EngineHandle {
        let handle = EngineHandle(self.handles.fetch_add(1, Ordering::Relaxed));
        self.store.insert(handle, tag, payload)
    }

    pub fn new_field(&mut self, data: Vec<f64>) -> EngineHandle {
        self.new_object(SemanticTag::Field, Payload::Field(data))
    }

    /// Build a container, taking over the caller's reference on each field
    pub fn new_fields_container(&mut self, fields: Vec<EngineHandle>) -> EngineHandle {
        let container = self.new_object(
            SemanticTag::FieldsContainer,
            Payload::FieldsContainer(fields.clone()),
        );
        for field in fields {
            self.store.release(field);
        }
        container
    }

    /// Publish an output; the slot's object reference moves into the output
    pub fn set_output(&mut self, pin: i32, slot: Slot) {
        if let Some(Slot::Object(_, old)) = self.outputs.insert(pin, slot) {
            self.store.release(old);
        }
    }

    /// Publish an input unchanged on an output pin
    pub fn forward(&mut self, from_pin: i32, to_pin: i32) -> EngineResult<()> {
        let slot = self.require(from_pin)?.clone();
        if let Slot::Object(_, handle) = slot {
            self.store.retain(handle);
        }
        self.set_output(to_pin, slot);
        Ok(())
    }

    pub fn into_outputs(self) -> BTreeMap<i32, Slot> {
        self.outputs
    }

    /// Drop outputs produced by a kernel that failed
    pub fn discard(self) {
        for slot in self.outputs.values() {
            if let Slot::Object(_, handle) = slot {
                self.store.release(*handle);
            }
        }
    }
}

/// Operand of the arithmetic kernels
enum Operand {
    Fields(Vec<Vec<f64>>),
    Field(Vec<f64>),
    Scalar(f64),
}

fn operand(ctx: &KernelContext<'_>, pin: i32) -> EngineResult<Operand> {
    match ctx.require(pin)? {
        Slot::Double(d) => Ok(Operand::Scalar(*d)),
        Slot::Int(i) => Ok(Operand::Scalar(f64::from(*i))),
        Slot::Object(SemanticTag::Field, handle) => {
            Ok(Operand::Field(ctx.store().field_data(*handle)?.to_vec()))
        }
        Slot::Object(SemanticTag::FieldsContainer, handle) => {
            let mut fields = Vec::new();
            for field in ctx.store().container_fields(*handle)? {
                fields.push(ctx.store().field_data(*field)?.to_vec());
            }
            Ok(Operand::Fields(fields))
        }
        other => Err(EngineError::type_mismatch(format!(
            "{}: input pin {} cannot be used in arithmetic ({})",
            ctx.operator_name(),
            pin,
            other.describe()
        ))),
    }
}

fn zip_with(a: &[f64], b: &[f64], op: fn(f64, f64) -> f64) -> EngineResult<Vec<f64>> {
    if a.len() != b.len() {
        return Err(EngineError::evaluation(format!(
            "field sizes differ ({} vs {})",
            a.len(),
            b.len()
        )));
    }
    Ok(a.iter().zip(b).map(|(x, y)| op(*x, *y)).collect())
}

fn combine(lhs: Operand, rhs: Operand, op: fn(f64, f64) -> f64) -> EngineResult<Vec<Vec<f64>>> {
    match (lhs, rhs) {
        (Operand::Fields(a), Operand::Fields(b)) => {
            if a.len() != b.len() {
                return Err(EngineError::evaluation(format!(
                    "fields containers differ in size ({} vs {})",
                    a.len(),
                    b.len()
                )));
            }
            a.iter().zip(&b).map(|(x, y)| zip_with(x, y, op)).collect()
        }
        (Operand::Fields(a), Operand::Field(f)) => a.iter().map(|x| zip_with(x, &f, op)).collect(),
        (Operand::Field(f), Operand::Fields(b)) => b.iter().map(|y| zip_with(&f, y, op)).collect(),
        (Operand::Fields(a), Operand::Scalar(s)) => Ok(a
            .into_iter()
            .map(|x| x.into_iter().map(|v| op(v, s)).collect())
            .collect()),
        (Operand::Scalar(s), Operand::Fields(b)) => Ok(b
            .into_iter()
            .map(|y| y.into_iter().map(|v| op(s, v)).collect())
            .collect()),
        (Operand::Field(a), Operand::Field(b)) => Ok(vec![zip_with(&a, &b, op)?]),
        (Operand::Field(a), Operand::Scalar(s)) => Ok(vec![a.into_iter().map(|v| op(v, s)).collect()]),
        (Operand::Scalar(s), Operand::Field(b)) => Ok(vec![b.into_iter().map(|v| op(s, v)).collect()]),
        (Operand::Scalar(_), Operand::Scalar(_)) => Err(EngineError::evaluation(
            "at least one operand must be a field or a fields container",
        )),
    }
}

fn arithmetic(op: fn(f64, f64) -> f64) -> KernelFn {
    Arc::new(move |ctx: &mut KernelContext<'_>| {
        let lhs = operand(ctx, 0)?;
        let rhs = operand(ctx, 1)?;
        let result = combine(lhs, rhs, op)?;
        let fields = result.into_iter().map(|data| ctx.new_field(data)).collect();
        let container = ctx.new_fields_container(fields);
        ctx.set_output(0, Slot::Object(SemanticTag::FieldsContainer, container));
        Ok(())
    })
}

/// Result readers synthesise deterministic data from the result file path
fn result_reader(scale: f64) -> KernelFn {
    Arc::new(move |ctx: &mut KernelContext<'_>| {
        let data_sources = ctx.input_object(4, SemanticTag::DataSources)?;
        let path = match &ctx.store().get(data_sources)?.payload {
            Payload::DataSources(path) => path.clone(),
            _ => String::new(),
        };
        if path.is_empty() {
            return Err(EngineError::evaluation(format!(
                "{}: data sources do not reference a result file",
                ctx.operator_name()
            )));
        }
        let seed = (path.bytes().map(u64::from).sum::<u64>() % 97) as f64;

        let time_sets: Vec<i32> = match ctx.input(0) {
            None => vec![1, 2],
            Some(Slot::Int(set)) => vec![*set],
            Some(Slot::Object(_, handle)) => ctx.store().ids(*handle)?.to_vec(),
            Some(other) => {
                return Err(EngineError::type_mismatch(format!(
                    "{}: time_scoping cannot be a {}",
                    ctx.operator_name(),
                    other.describe()
                )))
            }
        };
        let entities = match ctx.input(1) {
            Some(Slot::Object(SemanticTag::Scoping, handle)) => ctx.store().ids(*handle)?.len(),
            _ => 4,
        };

        let mut fields = Vec::new();
        for set in time_sets {
            let data = (0..entities)
                .map(|i| scale * (seed + f64::from(set) * 10.0 + i as f64))
                .collect();
            fields.push(ctx.new_field(data));
        }
        let container = ctx.new_fields_container(fields);
        ctx.set_output(0, Slot::Object(SemanticTag::FieldsContainer, container));
        Ok(())
    })
}

fn min_max_of(data: &[f64]) -> EngineResult<(f64, f64)> {
    if data.is_empty() {
        return Err(EngineError::evaluation("cannot compute min/max of an empty field"));
    }
    Ok(data
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v))))
}

fn min_max_kernel(ctx: &mut KernelContext<'_>) -> EngineResult<()> {
    let fields: Vec<Vec<f64>> = match ctx.require(0)? {
        Slot::Object(SemanticTag::Field, handle) => vec![ctx.store().field_data(*handle)?.to_vec()],
        Slot::Object(SemanticTag::FieldsContainer, handle) => {
            let mut fields = Vec::new();
            for field in ctx.store().container_fields(*handle)? {
                fields.push(ctx.store().field_data(*field)?.to_vec());
            }
            fields
        }
        other => {
            return Err(EngineError::type_mismatch(format!(
                "{}: cannot compute min/max of a {}",
                ctx.operator_name(),
                other.describe()
            )))
        }
    };
    let mut mins = Vec::with_capacity(fields.len());
    let mut maxs = Vec::with_capacity(fields.len());
    for data in &fields {
        let (lo, hi) = min_max_of(data)?;
        mins.push(lo);
        maxs.push(hi);
    }
    let field_min = ctx.new_field(mins);
    let field_max = ctx.new_field(maxs);
    ctx.set_output(0, Slot::Object(SemanticTag::Field, field_min));
    ctx.set_output(1, Slot::Object(SemanticTag::Field, field_max));
    Ok(())
}

fn merge_fields_kernel(ctx: &mut KernelContext<'_>) -> EngineResult<()> {
    let sum_merge = ctx.input_bool_or(0, false)?;
    let mut fields = Vec::new();
    for (pin, slot) in ctx.inputs_from(1) {
        match slot {
            Slot::Object(SemanticTag::Field, handle) => {
                fields.push(ctx.store().field_data(handle)?.to_vec())
            }
            other => {
                return Err(EngineError::type_mismatch(format!(
                    "{}: input pin {} expects field, got {}",
                    ctx.operator_name(),
                    pin,
                    other.describe()
                )))
            }
        }
    }
    if fields.is_empty() {
        return Err(EngineError::evaluation(format!(
            "{}: no field to merge",
            ctx.operator_name()
        )));
    }
    let merged = if sum_merge {
        let mut acc = fields[0].clone();
        for data in &fields[1..] {
            acc = zip_with(&acc, data, |a, b| a + b)?;
        }
        acc
    } else {
        fields.concat()
    };
    let field = ctx.new_field(merged);
    ctx.set_output(0, Slot::Object(SemanticTag::Field, field));
    Ok(())
}

fn cyclic_expansion_kernel(ctx: &mut KernelContext<'_>) -> EngineResult<()> {
    let container = ctx.input_object(2, SemanticTag::FieldsContainer)?;
    let sectors: usize = ctx
        .config_option("sectors")
        .and_then(|s| s.parse().ok())
        .unwrap_or(2);
    let mut expanded = Vec::new();
    for field in ctx.store().container_fields(container)? {
        let data = ctx.store().field_data(*field)?.to_vec();
        for _ in 0..sectors {
            expanded.push(data.clone());
        }
    }
    let fields = expanded.into_iter().map(|data| ctx.new_field(data)).collect();
    let out = ctx.new_fields_container(fields);
    ctx.set_output(0, Slot::Object(SemanticTag::FieldsContainer, out));
    Ok(())
}

fn mesh_provider_kernel(ctx: &mut KernelContext<'_>) -> EngineResult<()> {
    let data_sources = ctx.input_object(4, SemanticTag::DataSources)?;
    let source = match &ctx.store().get(data_sources)?.payload {
        Payload::DataSources(path) => path.clone(),
        _ => String::new(),
    };
    let mesh = ctx.new_object(SemanticTag::MeshedRegion, Payload::MeshedRegion { source });
    ctx.set_output(0, Slot::Object(SemanticTag::MeshedRegion, mesh));
    Ok(())
}

/// Kernels available in every in-process engine, keyed by internal name
pub fn builtin_kernels() -> HashMap<String, KernelFn> {
    let mut kernels: HashMap<String, KernelFn> = HashMap::new();
    kernels.insert("S".to_string(), result_reader(1.0e6));
    kernels.insert("U".to_string(), result_reader(1.0e-3));
    kernels.insert("MeshProvider".to_string(), Arc::new(mesh_provider_kernel));
    kernels.insert("min_max".to_string(), Arc::new(min_max_kernel));
    kernels.insert("min_max_fc".to_string(), Arc::new(min_max_kernel));
    kernels.insert("add_fc".to_string(), arithmetic(|a, b| a + b));
    kernels.insert("minus_fc".to_string(), arithmetic(|a, b| a - b));
    kernels.insert("scale_fc".to_string(), arithmetic(|a, b| a * b));
    kernels.insert("merge::fields".to_string(), Arc::new(merge_fields_kernel));
    kernels.insert("cyclic_expansion".to_string(), Arc::new(cyclic_expansion_kernel));

    let forward: KernelFn = Arc::new(|ctx: &mut KernelContext<'_>| ctx.forward(0, 0));
    kernels.insert("forward".to_string(), forward.clone());
    for tag in SemanticTag::ALL {
        if tag != SemanticTag::Any {
            kernels.insert(format!("forward_{}", tag.name()), forward.clone());
        }
    }
    kernels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_broadcasts_scalars() {
        let out = combine(
            Operand::Fields(vec![vec![1.0, 2.0], vec![3.0]]),
            Operand::Scalar(2.0),
            |a, b| a * b,
        )
        .unwrap();
        assert_eq!(out, vec![vec![2.0, 4.0], vec![6.0]]);
    }

    #[test]
    fn test_combine_rejects_size_mismatch() {
        let err = combine(
            Operand::Field(vec![1.0, 2.0]),
            Operand::Field(vec![1.0]),
            |a, b| a + b,
        )
        .unwrap_err();
        assert!(err.message.contains("field sizes differ"));
    }

    #[test]
    fn test_builtin_kernels_cover_forwarders() {
        let kernels = builtin_kernels();
        assert!(kernels.contains_key("forward_fields_container"));
        assert!(kernels.contains_key("forward_bool"));
        assert!(!kernels.contains_key("forward_any"));
    }
}
