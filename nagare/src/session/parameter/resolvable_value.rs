pub trait ResolvableValue<Value> {
    fn resolve(&self) -> Value;
}
