//! DynamoDB store backend.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::config::Credentials;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::operation::create_table::CreateTableError;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, BillingMode, KeySchemaElement, KeyType,
    ScalarAttributeType,
};

use crate::config::Config;
use crate::store::{ProvisionOutcome, ScanPage, StoreError, VoteStore};
use crate::voteable::Voteable;

const ID_ATTR: &str = "ID";
const QUESTION_ATTR: &str = "Question";
const ANSWERS_ATTR: &str = "Answers";
const VOTES_ATTR: &str = "Votes";

pub struct DynamoStore {
    client: Client,
    table_name: String,
}

impl DynamoStore {
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    /// Builds a client against the configured endpoint. Static credentials
    /// from the config take precedence over the SDK default chain.
    pub async fn connect(config: &Config) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.aws_region.clone()))
            .endpoint_url(format!("http://{}:{}", config.db_host, config.db_port));

        if !config.aws_id.is_empty() {
            let token = (!config.aws_token.is_empty()).then(|| config.aws_token.clone());
            loader = loader.credentials_provider(Credentials::new(
                config.aws_id.clone(),
                config.aws_secret.clone(),
                token,
                None,
                "ballotd",
            ));
        }

        let sdk_config = loader.load().await;
        Self::new(Client::new(&sdk_config), config.table_name.clone())
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

#[async_trait]
impl VoteStore for DynamoStore {
    async fn provision(&self) -> Result<ProvisionOutcome, StoreError> {
        let key_schema = KeySchemaElement::builder()
            .attribute_name(ID_ATTR)
            .key_type(KeyType::Hash)
            .build()
            .map_err(|e| StoreError::Provision(e.to_string()))?;
        let id_attribute = AttributeDefinition::builder()
            .attribute_name(ID_ATTR)
            .attribute_type(ScalarAttributeType::S)
            .build()
            .map_err(|e| StoreError::Provision(e.to_string()))?;

        let result = self
            .client
            .create_table()
            .table_name(&self.table_name)
            .key_schema(key_schema)
            .attribute_definitions(id_attribute)
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await;

        match result {
            Ok(_) => Ok(ProvisionOutcome::Created),
            Err(err) => {
                if err
                    .as_service_error()
                    .is_some_and(CreateTableError::is_resource_in_use_exception)
                {
                    return Ok(ProvisionOutcome::AlreadyExists);
                }
                Err(StoreError::Provision(
                    DisplayErrorContext(&err).to_string(),
                ))
            }
        }
    }

    async fn put(&self, voteable: &Voteable) -> Result<(), StoreError> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item_from_voteable(voteable)))
            .condition_expression("attribute_not_exists(ID)")
            .send()
            .await
            .map_err(|e| StoreError::Put(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    async fn scan(&self, limit: i64, start_after: Option<&str>) -> Result<ScanPage, StoreError> {
        let mut start_key = start_after.map(|id| {
            HashMap::from([(ID_ATTR.to_string(), AttributeValue::S(id.to_string()))])
        });

        if limit > 0 {
            let output = self
                .client
                .scan()
                .table_name(&self.table_name)
                .limit(limit.min(i64::from(i32::MAX)) as i32)
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(|e| StoreError::Scan(DisplayErrorContext(&e).to_string()))?;

            let items = output
                .items
                .unwrap_or_default()
                .iter()
                .map(voteable_from_item)
                .collect::<Result<Vec<_>, _>>()?;
            let last_key = last_evaluated_id(output.last_evaluated_key.as_ref());
            return Ok(ScanPage { items, last_key });
        }

        // No limit: page through to the end of the table.
        let mut items = Vec::new();
        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.table_name)
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| StoreError::Scan(DisplayErrorContext(&e).to_string()))?;

            for item in output.items.unwrap_or_default() {
                items.push(voteable_from_item(&item)?);
            }
            match output.last_evaluated_key {
                Some(key) => start_key = Some(key),
                None => break,
            }
        }
        Ok(ScanPage {
            items,
            last_key: None,
        })
    }

    async fn increment_vote(&self, id: &str, answer_index: i32) -> Result<(), StoreError> {
        // The update expression reads the counter it writes, so an unknown
        // id or an out-of-range index fails the update at the store
        // instead of creating state.
        let path = format!("{VOTES_ATTR}[{answer_index}]");
        self.client
            .update_item()
            .table_name(&self.table_name)
            .key(ID_ATTR, AttributeValue::S(id.to_string()))
            .update_expression(format!("SET {path} = {path} + :inc"))
            .expression_attribute_values(":inc", AttributeValue::N("1".to_string()))
            .send()
            .await
            .map_err(|e| StoreError::Update(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }
}

fn item_from_voteable(voteable: &Voteable) -> HashMap<String, AttributeValue> {
    HashMap::from([
        (
            ID_ATTR.to_string(),
            AttributeValue::S(voteable.id.clone()),
        ),
        (
            QUESTION_ATTR.to_string(),
            AttributeValue::S(voteable.question.clone()),
        ),
        (
            ANSWERS_ATTR.to_string(),
            AttributeValue::L(
                voteable
                    .answers
                    .iter()
                    .map(|a| AttributeValue::S(a.clone()))
                    .collect(),
            ),
        ),
        (
            VOTES_ATTR.to_string(),
            AttributeValue::L(
                voteable
                    .votes
                    .iter()
                    .map(|v| AttributeValue::N(v.to_string()))
                    .collect(),
            ),
        ),
    ])
}

fn voteable_from_item(item: &HashMap<String, AttributeValue>) -> Result<Voteable, StoreError> {
    let answers = list_attr(item, ANSWERS_ATTR)?
        .iter()
        .map(|v| {
            v.as_s()
                .ok()
                .cloned()
                .ok_or_else(|| {
                    StoreError::Decode(format!("{ANSWERS_ATTR} element is not a string"))
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let votes = list_attr(item, VOTES_ATTR)?
        .iter()
        .map(|v| {
            v.as_n()
                .ok()
                .and_then(|n| n.parse::<i64>().ok())
                .ok_or_else(|| StoreError::Decode(format!("{VOTES_ATTR} element is not a number")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Voteable {
        id: string_attr(item, ID_ATTR)?,
        question: string_attr(item, QUESTION_ATTR)?,
        answers,
        votes,
    })
}

fn string_attr(item: &HashMap<String, AttributeValue>, name: &str) -> Result<String, StoreError> {
    item.get(name)
        .and_then(|v| v.as_s().ok())
        .cloned()
        .ok_or_else(|| StoreError::Decode(format!("missing string attribute {name}")))
}

fn list_attr<'a>(
    item: &'a HashMap<String, AttributeValue>,
    name: &str,
) -> Result<&'a Vec<AttributeValue>, StoreError> {
    item.get(name)
        .and_then(|v| v.as_l().ok())
        .ok_or_else(|| StoreError::Decode(format!("missing list attribute {name}")))
}

fn last_evaluated_id(key: Option<&HashMap<String, AttributeValue>>) -> Option<String> {
    key?.get(ID_ATTR)?.as_s().ok().cloned()
}
