use serde::{Deserialize, Serialize};

#[derive(Clone, Deserialize, Serialize, Debug, PartialEq)]
#[serde(untagged)]
pub enum ValueOrList<T: Clone> {
    Value(T),
    List(Vec<T>),
}

impl<T: Clone> ValueOrList<T> {
    pub fn to_list(&self) -> Vec<T> {
        match self {
            ValueOrList::Value(value) => vec![value.clone()],
            ValueOrList::List(list) => list.clone(),
        }
    }
}
