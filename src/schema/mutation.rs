//! Mutation root fields: `create<Name>`, `update<Name>`, `upsert<Name>`.

use async_graphql::dynamic::{Field, FieldFuture, FieldValue, InputValue, TypeRef};
use std::sync::Arc;

use super::model::{CollectionModel, Runtime};
use super::types::args_json;
use crate::error::ContentError;
use crate::resolvers::mutation::{create, update, upsert};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Update,
    Upsert,
}

impl MutationKind {
    pub const ALL: [MutationKind; 3] = [Self::Create, Self::Update, Self::Upsert];

    fn prefix(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Upsert => "upsert",
        }
    }
}

/// `Author` -> `author`
fn argument_name(type_name: &str) -> String {
    let mut chars = type_name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn mutation_field(model: &CollectionModel, kind: MutationKind) -> Field {
    let collection = model.name().to_string();
    let arg_name = argument_name(&model.type_name);
    let input = format!("{}Input", model.type_name);
    let input_ref = match kind {
        MutationKind::Upsert => TypeRef::named(input),
        MutationKind::Create | MutationKind::Update => TypeRef::named_nn(input),
    };
    let arg = arg_name.clone();

    Field::new(
        format!("{}{}", kind.prefix(), model.type_name),
        TypeRef::named(model.type_name.clone()),
        move |ctx| {
            let collection = collection.clone();
            let arg = arg.clone();
            FieldFuture::new(async move {
                let runtime = ctx.data::<Arc<Runtime>>()?;
                let mut args = args_json(&ctx)?;
                let payload = args
                    .remove(&arg)
                    .filter(|value| !value.is_null())
                    .ok_or_else(|| ContentError::Schema(format!("missing `{}` argument", arg)))?;
                let stored = match kind {
                    MutationKind::Create => create(runtime, &collection, payload).await?,
                    MutationKind::Update => update(runtime, &collection, payload).await?,
                    MutationKind::Upsert => upsert(runtime, &collection, payload).await?,
                };
                Ok(Some(FieldValue::owned_any(stored)))
            })
        },
    )
    .argument(InputValue::new(arg_name, input_ref))
}
