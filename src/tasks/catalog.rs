/// Built-in annotation table of the Azure project battery
/// Only classes carrying game metadata are listed.
use crate::tasks::registry::{TaskAnnotation, UNGROUPED};

const NAMESPACE: &str = "AzureProjectTest";

/// (class, order, method, instruction, time limit, reward, group)
type Row = (
    &'static str,
    Option<i32>,
    &'static str,
    &'static str,
    u32,
    u32,
    i32,
);

const ROWS: &[Row] = &[
    (
        "ResourceGroupTest",
        Some(1),
        "Test01_ResourceGroupExist",
        "Can you help create a resource group named 'projProd' in Hong Kong?",
        2,
        10,
        1,
    ),
    (
        "ResourceGroupTest",
        Some(1),
        "Test02_ResourceGroupLocation",
        "",
        0,
        0,
        1,
    ),
    (
        "StorageAccountTest",
        Some(2),
        "Test01_StorageAccountsWithTag",
        "Can you help create a Storage account in resource group 'projProd' and add tag name 'usage' and value 'logic'?",
        2,
        10,
        UNGROUPED,
    ),
    (
        "StorageAccountTest",
        Some(2),
        "Test02_StorageAccountsWithTag",
        "Can you help create a Storage account in resource group 'projProd' and add tag name 'usage' and value 'StaticWeb'?",
        2,
        10,
        UNGROUPED,
    ),
    (
        "StorageAccountTest",
        Some(2),
        "Test03_StorageAccountSettings",
        "Can you help change your Storage account tagged 'usage' with 'logic' to southeastasia, AccessTier to Hot, StorageV2, Standard_LRS and allow public access?",
        2,
        20,
        UNGROUPED,
    ),
    (
        "StorageAccountTest",
        Some(2),
        "Test04_WebStorageAccountSettings",
        "Can you help change your Storage account tagged 'usage' with 'StaticWeb' to eastasia, AccessTier to Hot, StorageV2, Standard_LRS and allow public access?I need the index page of text 'This is index page.' and the error page of text 'This is error page.'.",
        2,
        30,
        UNGROUPED,
    ),
    (
        "StorageAccountTest",
        Some(2),
        "Test05_StorageAccountCodeContainer",
        "I need a Blog container named 'code' in Storage account tagged 'usage' with 'logic'. Can you help?",
        2,
        10,
        UNGROUPED,
    ),
    (
        "StorageAccountTest",
        Some(2),
        "Test06_StorageAccountMessageTable",
        "I need a Azure table named 'message' in Storage account tagged 'usage' with 'logic'. Can you help?",
        2,
        10,
        UNGROUPED,
    ),
    (
        "StorageAccountTest",
        Some(2),
        "Test07_StorageAccountJobQueue",
        "I need a Azure Storage Queue named 'job' in Storage account tagged 'usage' with 'logic'. Can you help?",
        2,
        10,
        UNGROUPED,
    ),
    (
        "ApplicationInsightTest",
        Some(4),
        "Test01_AppServicePlanWithTag",
        "Can you a ApplicationInsight in Hong Kong? Type is 'other', keeps log for 30 days, and tag name is 'key' with value 'ApplicationInsights'.",
        3,
        10,
        1,
    ),
    (
        "ApplicationInsightTest",
        Some(4),
        "Test02_AppServicePlanSettings",
        "",
        0,
        0,
        1,
    ),
];

/// The annotation feed in declaration order
pub fn builtin_annotations() -> Vec<TaskAnnotation> {
    ROWS.iter()
        .map(
            |&(class, order, method, instruction, time_limit, reward, group)| TaskAnnotation {
                class_name: format!("{}.{}", NAMESPACE, class),
                method_name: method.to_string(),
                class_order: order,
                instruction: instruction.to_string(),
                time_limit,
                reward,
                group_number: group,
            },
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_names_are_qualified() {
        let feed = builtin_annotations();
        assert!(feed
            .iter()
            .all(|a| a.class_name.starts_with("AzureProjectTest.")));
        assert_eq!(
            feed[0].fully_qualified_name(),
            "AzureProjectTest.ResourceGroupTest.Test01_ResourceGroupExist"
        );
    }

    #[test]
    fn test_every_catalog_class_is_ordered() {
        let feed = builtin_annotations();
        assert!(feed.iter().all(|a| a.class_order.is_some()));

        // Two groups of two plus seven standalone storage tests
        let registry = crate::tasks::TaskRegistry::from_annotations(&feed).unwrap();
        assert_eq!(registry.len(), 9);
    }
}
