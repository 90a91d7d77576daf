//! Plugin identifier to tool category mapping

use flowlineage_core::ToolCategory;
use regex::Regex;
use std::sync::OnceLock;

/// Known plugin short names, their category and display name
const TOOL_TABLE: &[(&str, ToolCategory, &str)] = &[
    // Inputs
    ("DbFileInput", ToolCategory::Input, "Input Data"),
    ("TextInput", ToolCategory::Input, "Text Input"),
    ("DynamicInput", ToolCategory::Input, "Dynamic Input"),
    ("Directory", ToolCategory::Input, "Directory"),
    ("LockInInput", ToolCategory::Input, "In-DB Input"),
    ("ConnectInDB", ToolCategory::Input, "Connect In-DB"),
    // Outputs
    ("DbFileOutput", ToolCategory::Output, "Output Data"),
    ("LockInOutput", ToolCategory::Output, "In-DB Output"),
    ("LockInWrite", ToolCategory::Output, "Write In-DB"),
    ("Render", ToolCategory::Output, "Render"),
    ("BrowseV2", ToolCategory::Browse, "Browse"),
    ("Browse", ToolCategory::Browse, "Browse"),
    // Preparation
    ("Filter", ToolCategory::Filter, "Filter"),
    ("LockInFilter", ToolCategory::Filter, "In-DB Filter"),
    ("Formula", ToolCategory::Formula, "Formula"),
    ("MultiFieldFormula", ToolCategory::Formula, "Multi-Field Formula"),
    ("MultiRowFormula", ToolCategory::Formula, "Multi-Row Formula"),
    ("LockInFormula", ToolCategory::Formula, "In-DB Formula"),
    ("AlteryxSelect", ToolCategory::Select, "Select"),
    ("LockInSelect", ToolCategory::Select, "In-DB Select"),
    ("DynamicRename", ToolCategory::Select, "Dynamic Rename"),
    ("Sort", ToolCategory::Sort, "Sort"),
    // Join
    ("Join", ToolCategory::Join, "Join"),
    ("JoinMultiple", ToolCategory::Join, "Join Multiple"),
    ("LockInJoin", ToolCategory::Join, "In-DB Join"),
    ("Union", ToolCategory::Union, "Union"),
    ("LockInUnion", ToolCategory::Union, "In-DB Union"),
    // Aggregation
    ("Summarize", ToolCategory::Summarize, "Summarize"),
    ("LockInSummarize", ToolCategory::Summarize, "In-DB Summarize"),
    ("CrossTab", ToolCategory::Summarize, "Cross Tab"),
    // Macro boundaries
    ("MacroInput", ToolCategory::MacroInput, "Macro Input"),
    ("MacroOutput", ToolCategory::MacroOutput, "Macro Output"),
    // Layout
    ("ToolContainer", ToolCategory::Container, "Tool Container"),
];

/// Generic transforms recognized by name only
const TRANSFORM_TOOLS: &[&str] = &[
    "AppendFields",
    "DataCleansing",
    "DateTime",
    "FindReplace",
    "GenerateRows",
    "Imputation",
    "RecordID",
    "RegEx",
    "Sample",
    "TextToColumns",
    "Tile",
    "Transpose",
    "Unique",
];

/// Last dotted segment of a plugin identifier
///
/// `AlteryxBasePluginsGui.DbFileInput.DbFileInput` becomes `DbFileInput`.
pub fn plugin_short_name(plugin: &str) -> &str {
    plugin.rsplit('.').next().unwrap_or(plugin)
}

/// Category for a plugin identifier
pub fn category_for_plugin(plugin: &str) -> ToolCategory {
    let short = plugin_short_name(plugin);

    if let Some((_, category, _)) = TOOL_TABLE.iter().find(|(name, _, _)| *name == short) {
        return *category;
    }

    if TRANSFORM_TOOLS.contains(&short) {
        ToolCategory::Transform
    } else {
        ToolCategory::Unknown
    }
}

/// Human readable tool name for a plugin identifier
pub fn display_name_for_plugin(plugin: &str) -> String {
    let short = plugin_short_name(plugin);

    if let Some((_, _, display)) = TOOL_TABLE.iter().find(|(name, _, _)| *name == short) {
        return display.to_string();
    }

    split_camel_case(short)
}

/// `FindReplace` -> `Find Replace`
fn split_camel_case(name: &str) -> String {
    static BOUNDARY: OnceLock<Regex> = OnceLock::new();
    let boundary = BOUNDARY.get_or_init(|| {
        Regex::new(r"([a-z0-9])([A-Z])").expect("static pattern is valid")
    });
    boundary.replace_all(name, "$1 $2").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_plugins_map_to_categories() {
        assert_eq!(
            category_for_plugin("AlteryxBasePluginsGui.DbFileInput.DbFileInput"),
            ToolCategory::Input
        );
        assert_eq!(
            category_for_plugin("AlteryxBasePluginsGui.Join.Join"),
            ToolCategory::Join
        );
        assert_eq!(
            category_for_plugin("AlteryxBasePluginsGui.MacroInput.MacroInput"),
            ToolCategory::MacroInput
        );
        assert_eq!(
            category_for_plugin("AlteryxBasePluginsGui.Unique.Unique"),
            ToolCategory::Transform
        );
        assert_eq!(category_for_plugin("Vendor.Widget.Widget"), ToolCategory::Unknown);
    }

    #[test]
    fn display_names() {
        assert_eq!(display_name_for_plugin("AlteryxBasePluginsGui.AlteryxSelect.AlteryxSelect"), "Select");
        assert_eq!(display_name_for_plugin("AlteryxBasePluginsGui.FindReplace.FindReplace"), "Find Replace");
        assert_eq!(display_name_for_plugin("Plain"), "Plain");
    }
}
