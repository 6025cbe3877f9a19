use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use serde_with::{serde_as, DisplayFromStr};

use super::{Classifier, ModelError};

// --- JSON layout written by `Booster.save_model("model.json")` ----------------------

#[derive(Debug, Deserialize)]
struct Document {
    learner: Learner,
}

#[derive(Debug, Deserialize)]
struct Learner {
    #[serde(default)]
    feature_names: Vec<String>,
    gradient_booster: Value,
    learner_model_param: LearnerModelParam,
    objective: ObjectiveParam,
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct LearnerModelParam {
    #[serde(deserialize_with = "deserialize_base_score")]
    base_score: f32,
    #[serde_as(as = "DisplayFromStr")]
    num_class: i64,
    #[serde_as(as = "DisplayFromStr")]
    num_feature: usize,
}

#[derive(Debug, Deserialize)]
struct ObjectiveParam {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ModelTrees {
    trees: Vec<TreeJson>,
    #[serde(default)]
    tree_info: Vec<usize>,
}

#[derive(Debug, Deserialize)]
struct TreeJson {
    tree_param: TreeParam,
    left_children: Vec<i32>,
    right_children: Vec<i32>,
    split_indices: Vec<i64>,
    split_conditions: Vec<f32>,
    #[serde(deserialize_with = "deserialize_flags")]
    default_left: Vec<bool>,
    #[serde(default)]
    split_type: Vec<i32>,
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct TreeParam {
    #[serde_as(as = "DisplayFromStr")]
    num_nodes: usize,
}

/// base_score is written as a number, a string ("5E-1"), an array, or a
/// bracketed string ("[5E-1]") depending on the XGBoost release.
fn deserialize_base_score<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as _;

    let value = Value::deserialize(deserializer)?;
    base_score_from(&value)
        .ok_or_else(|| D::Error::custom(format!("cannot read base_score from {value}")))
}

fn base_score_from(value: &Value) -> Option<f32> {
    match value {
        Value::Number(number) => number.as_f64().map(|score| score as f32),
        Value::String(text) => {
            let text = text.trim();
            let inner = text
                .strip_prefix('[')
                .and_then(|rest| rest.strip_suffix(']'))
                .unwrap_or(text);
            inner.split(',').next()?.trim().parse().ok()
        }
        Value::Array(items) => items.first().and_then(base_score_from),
        _ => None,
    }
}

/// default_left is 0/1 in JSON models and true/false in some converters.
fn deserialize_flags<'de, D>(deserializer: D) -> Result<Vec<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as _;

    Vec::<Value>::deserialize(deserializer)?
        .into_iter()
        .map(|flag| match flag {
            Value::Bool(flag) => Ok(flag),
            Value::Number(number) => Ok(number.as_f64().unwrap_or(0.0) != 0.0),
            other => Err(D::Error::custom(format!("invalid default_left flag {other}"))),
        })
        .collect()
}

// --- Native representation ----------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    /// `binary:logistic`: one margin, sigmoid link.
    BinaryLogistic,
    /// `multi:softprob` / `multi:softmax`: one margin per class, softmax link.
    Softmax { num_class: usize },
}

impl Objective {
    fn parse(name: &str, num_class: i64) -> Result<Self, ModelError> {
        match name {
            "binary:logistic" => Ok(Objective::BinaryLogistic),
            "multi:softprob" | "multi:softmax" if num_class >= 2 => Ok(Objective::Softmax {
                num_class: num_class as usize,
            }),
            other => Err(ModelError::UnsupportedObjective(other.to_string())),
        }
    }

    fn num_groups(self) -> usize {
        match self {
            Objective::BinaryLogistic => 1,
            Objective::Softmax { num_class } => num_class,
        }
    }

    /// The artifact stores base_score in probability space for logistic objectives.
    fn base_margin(self, base_score: f32) -> f32 {
        match self {
            Objective::BinaryLogistic => {
                let p = base_score.clamp(1e-7, 1.0 - 1e-7);
                (p / (1.0 - p)).ln()
            }
            Objective::Softmax { .. } => base_score,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Node {
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
        default_left: bool,
    },
    Leaf(f32),
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
    group: usize,
    weight: f32,
}

impl Tree {
    fn leaf_value(&self, row: &[f32]) -> f32 {
        let mut index = 0;
        loop {
            match self.nodes[index] {
                Node::Leaf(value) => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    default_left,
                } => {
                    let value = row.get(feature).copied().unwrap_or(f32::NAN);
                    index = if value.is_nan() {
                        if default_left {
                            left
                        } else {
                            right
                        }
                    } else if value < threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }
}

/// Gradient boosted trees loaded from an XGBoost JSON model.
#[derive(Debug, Clone)]
pub struct XgbClassifier {
    trees: Vec<Tree>,
    base_margin: f32,
    objective: Objective,
    num_features: usize,
    feature_names: Option<Vec<String>>,
}

impl XgbClassifier {
    pub fn from_path(path: &Path) -> Result<Self, ModelError> {
        let file = File::open(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let document: Document = serde_json::from_reader(BufReader::new(file))?;
        Self::from_document(document)
    }

    pub fn from_value(value: Value) -> Result<Self, ModelError> {
        Self::from_document(serde_json::from_value(value)?)
    }

    fn from_document(document: Document) -> Result<Self, ModelError> {
        let learner = document.learner;
        let param = learner.learner_model_param;
        let objective = Objective::parse(&learner.objective.name, param.num_class)?;
        let (model, weights) = booster_trees(learner.gradient_booster)?;
        let num_groups = objective.num_groups();

        let trees = model
            .trees
            .iter()
            .enumerate()
            .map(|(index, tree)| {
                let group = model.tree_info.get(index).copied().unwrap_or(0);
                if group >= num_groups {
                    return Err(ModelError::MalformedTree {
                        tree: index,
                        reason: format!("assigned to output {group} of {num_groups}"),
                    });
                }
                let weight = weights
                    .as_ref()
                    .and_then(|weights| weights.get(index))
                    .copied()
                    .unwrap_or(1.0);
                Ok(Tree {
                    nodes: convert_tree(tree, index, param.num_feature)?,
                    group,
                    weight,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let feature_names = if learner.feature_names.is_empty() {
            None
        } else {
            Some(learner.feature_names)
        };

        Ok(Self {
            trees,
            base_margin: objective.base_margin(param.base_score),
            objective,
            num_features: param.num_feature,
            feature_names,
        })
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    fn margins(&self, row: &[f32]) -> Vec<f32> {
        let mut margins = vec![self.base_margin; self.objective.num_groups()];
        for tree in &self.trees {
            margins[tree.group] += tree.weight * tree.leaf_value(row);
        }
        margins
    }
}

fn booster_trees(booster: Value) -> Result<(ModelTrees, Option<Vec<f32>>), ModelError> {
    #[derive(Deserialize)]
    struct Gbtree {
        model: ModelTrees,
    }

    #[derive(Deserialize)]
    struct Dart {
        gbtree: Gbtree,
        #[serde(default)]
        weight_drop: Vec<f32>,
    }

    let name = booster
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();

    match name.as_str() {
        "gbtree" => {
            let gbtree: Gbtree = serde_json::from_value(booster)?;
            Ok((gbtree.model, None))
        }
        "dart" => {
            let dart: Dart = serde_json::from_value(booster)?;
            Ok((dart.gbtree.model, Some(dart.weight_drop)))
        }
        _ => Err(ModelError::UnsupportedBooster(name)),
    }
}

fn convert_tree(tree: &TreeJson, index: usize, num_features: usize) -> Result<Vec<Node>, ModelError> {
    let malformed = |reason: String| ModelError::MalformedTree {
        tree: index,
        reason,
    };

    let num_nodes = tree.tree_param.num_nodes;
    if num_nodes == 0 {
        return Err(malformed("tree has no nodes".to_string()));
    }

    let columns = [
        ("left_children", tree.left_children.len()),
        ("right_children", tree.right_children.len()),
        ("split_indices", tree.split_indices.len()),
        ("split_conditions", tree.split_conditions.len()),
        ("default_left", tree.default_left.len()),
    ];
    for (column, len) in columns {
        if len < num_nodes {
            return Err(malformed(format!("{column} has {len} entries for {num_nodes} nodes")));
        }
    }
    if tree.split_type.iter().take(num_nodes).any(|kind| *kind != 0) {
        return Err(malformed("categorical splits are not supported".to_string()));
    }

    let mut nodes = Vec::with_capacity(num_nodes);
    for node in 0..num_nodes {
        let left = tree.left_children[node];
        if left == -1 {
            // leaves keep their value in split_conditions
            nodes.push(Node::Leaf(tree.split_conditions[node]));
            continue;
        }

        // children always come after their parent, which keeps traversal finite
        let child = |link: i32| {
            usize::try_from(link)
                .ok()
                .filter(|&child| child > node && child < num_nodes)
                .ok_or_else(|| malformed(format!("node {node} links to child {link}")))
        };
        let feature = usize::try_from(tree.split_indices[node])
            .ok()
            .filter(|&feature| feature < num_features)
            .ok_or_else(|| {
                malformed(format!(
                    "node {node} splits on feature {} of {num_features}",
                    tree.split_indices[node]
                ))
            })?;

        nodes.push(Node::Split {
            feature,
            threshold: tree.split_conditions[node],
            left: child(left)?,
            right: child(tree.right_children[node])?,
            default_left: tree.default_left[node],
        });
    }

    Ok(nodes)
}

fn sigmoid(margin: f32) -> f32 {
    1.0 / (1.0 + (-margin).exp())
}

fn softmax(margins: &[f32]) -> Vec<f32> {
    let max = margins.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = margins.iter().map(|margin| (margin - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    exps.into_iter().map(|value| value / total).collect()
}

fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (index, value) in values.iter().enumerate() {
        if *value > values[best] {
            best = index;
        }
    }
    best
}

impl Classifier for XgbClassifier {
    fn predict_class(&self, row: &[f32]) -> usize {
        let proba = self.predict_proba(row);
        match self.objective {
            Objective::BinaryLogistic => usize::from(proba[1] > 0.5),
            Objective::Softmax { .. } => argmax(&proba),
        }
    }

    fn predict_proba(&self, row: &[f32]) -> Vec<f32> {
        let margins = self.margins(row);
        match self.objective {
            Objective::BinaryLogistic => {
                let positive = sigmoid(margins[0]);
                vec![1.0 - positive, positive]
            }
            Objective::Softmax { .. } => softmax(&margins),
        }
    }

    fn num_features(&self) -> usize {
        self.num_features
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn describe(&self) -> String {
        let objective = match self.objective {
            Objective::BinaryLogistic => "binary:logistic".to_string(),
            Objective::Softmax { num_class } => format!("multi:softprob ({num_class} classes)"),
        };
        format!(
            "{} trees, {objective}, {} features",
            self.trees.len(),
            self.num_features
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stump(feature: i64, threshold: f32, left: f32, right: f32) -> Value {
        json!({
            "tree_param": {"num_nodes": "3", "num_feature": "17", "num_deleted": "0", "size_leaf_vector": "1"},
            "left_children": [1, -1, -1],
            "right_children": [2, -1, -1],
            "split_indices": [feature, 0, 0],
            "split_conditions": [threshold, left, right],
            "default_left": [1, 0, 0],
            "split_type": [0, 0, 0],
            "base_weights": [0.0, left, right]
        })
    }

    fn model(objective: &str, num_class: &str, base_score: Value, booster: Value) -> Value {
        json!({
            "learner": {
                "gradient_booster": booster,
                "learner_model_param": {
                    "base_score": base_score,
                    "num_class": num_class,
                    "num_feature": "17",
                    "num_target": "1"
                },
                "objective": {"name": objective}
            },
            "version": [2, 0, 3]
        })
    }

    fn gbtree(trees: Vec<Value>, tree_info: Vec<usize>) -> Value {
        json!({
            "name": "gbtree",
            "model": {
                "gbtree_model_param": {"num_trees": trees.len().to_string(), "num_parallel_tree": "1"},
                "trees": trees,
                "tree_info": tree_info
            }
        })
    }

    fn binary(trees: Vec<Value>) -> XgbClassifier {
        let info = vec![0; trees.len()];
        XgbClassifier::from_value(model("binary:logistic", "0", json!("5E-1"), gbtree(trees, info)))
            .unwrap()
    }

    fn row(pairs: &[(usize, f32)]) -> Vec<f32> {
        let mut row = vec![0.0; 17];
        for (index, value) in pairs {
            row[*index] = *value;
        }
        row
    }

    #[test]
    fn base_score_accepts_every_serialized_form() {
        for score in [json!(0.25), json!("0.25"), json!("2.5E-1"), json!("[2.5E-1]"), json!([0.25])] {
            let value = model("binary:logistic", "0", score.clone(), gbtree(vec![], vec![]));
            let classifier = XgbClassifier::from_value(value).unwrap();
            let proba = classifier.predict_proba(&row(&[]));
            assert!((proba[1] - 0.25).abs() < 1e-5, "base_score {score} gave {proba:?}");
        }
    }

    #[test]
    fn binary_margin_sums_tree_leaves() {
        let classifier = binary(vec![stump(12, 4.5, -0.6, 0.5), stump(15, 10.0, -0.4, 0.3)]);

        let proba = classifier.predict_proba(&row(&[(12, 5.0), (15, 12.0)]));
        assert!((proba[1] - sigmoid(0.8)).abs() < 1e-6);
        assert!((proba[0] + proba[1] - 1.0).abs() < 1e-6);
        assert_eq!(classifier.predict_class(&row(&[(12, 5.0), (15, 12.0)])), 1);

        assert_eq!(classifier.predict_class(&row(&[(12, 2.0), (15, 8.0)])), 0);
    }

    #[test]
    fn threshold_equality_goes_right() {
        let classifier = binary(vec![stump(0, 2.0, -1.0, 1.0)]);
        assert_eq!(classifier.predict_class(&row(&[(0, 2.0)])), 1);
        assert_eq!(classifier.predict_class(&row(&[(0, 1.999)])), 0);
    }

    #[test]
    fn missing_values_follow_default_direction() {
        let classifier = binary(vec![stump(0, 2.0, -1.0, 1.0)]);
        assert_eq!(classifier.predict_class(&row(&[(0, f32::NAN)])), 0);
    }

    #[test]
    fn dart_weights_scale_tree_output() {
        let booster = json!({
            "name": "dart",
            "gbtree": gbtree(vec![stump(0, 2.0, -1.0, 1.0), stump(1, 2.0, -1.0, 1.0)], vec![0, 0]),
            "weight_drop": [0.5, 0.25]
        });
        let classifier =
            XgbClassifier::from_value(model("binary:logistic", "0", json!(0.5), booster)).unwrap();

        let proba = classifier.predict_proba(&row(&[(0, 5.0), (1, 0.0)]));
        assert!((proba[1] - sigmoid(0.5 - 0.25)).abs() < 1e-6);
    }

    #[test]
    fn softmax_picks_most_likely_class() {
        let trees = vec![
            stump(0, 1.0, 0.1, 0.1),
            stump(0, 1.0, 0.2, 0.2),
            stump(0, 1.0, 0.3, 1.5),
        ];
        let classifier = XgbClassifier::from_value(model(
            "multi:softprob",
            "3",
            json!("5E-1"),
            gbtree(trees, vec![0, 1, 2]),
        ))
        .unwrap();

        let proba = classifier.predict_proba(&row(&[(0, 4.0)]));
        assert_eq!(proba.len(), 3);
        assert!((proba.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert_eq!(classifier.predict_class(&row(&[(0, 4.0)])), 2);
        assert_eq!(classifier.objective(), Objective::Softmax { num_class: 3 });
    }

    #[test]
    fn rejects_linear_boosters_and_unknown_objectives() {
        let linear = json!({"name": "gblinear", "model": {"weights": [0.1, 0.2]}});
        let err = XgbClassifier::from_value(model("binary:logistic", "0", json!(0.5), linear))
            .unwrap_err();
        assert!(matches!(err, ModelError::UnsupportedBooster(name) if name == "gblinear"));

        let err = XgbClassifier::from_value(model(
            "reg:squarederror",
            "0",
            json!(0.5),
            gbtree(vec![], vec![]),
        ))
        .unwrap_err();
        assert!(matches!(err, ModelError::UnsupportedObjective(name) if name == "reg:squarederror"));
    }

    #[test]
    fn rejects_malformed_trees() {
        let mut backwards = stump(0, 1.0, 0.0, 0.0);
        backwards["left_children"] = json!([0, -1, -1]);
        let mut out_of_range = stump(0, 1.0, 0.0, 0.0);
        out_of_range["right_children"] = json!([7, -1, -1]);
        let mut categorical = stump(0, 1.0, 0.0, 0.0);
        categorical["split_type"] = json!([1, 0, 0]);
        let unknown_feature = stump(40, 1.0, 0.0, 0.0);
        let mut truncated = stump(0, 1.0, 0.0, 0.0);
        truncated["split_conditions"] = json!([1.0]);

        for tree in [backwards, out_of_range, categorical, unknown_feature, truncated] {
            let value = model("binary:logistic", "0", json!(0.5), gbtree(vec![tree], vec![0]));
            let err = XgbClassifier::from_value(value).unwrap_err();
            assert!(matches!(err, ModelError::MalformedTree { tree: 0, .. }), "{err}");
        }
    }

    #[test]
    fn rejects_tree_assigned_to_missing_output() {
        let value = model(
            "binary:logistic",
            "0",
            json!(0.5),
            gbtree(vec![stump(0, 1.0, 0.0, 0.0)], vec![1]),
        );
        let err = XgbClassifier::from_value(value).unwrap_err();
        assert!(err.to_string().contains("assigned to output 1 of 1"));
    }

    #[test]
    fn describe_mentions_tree_count() {
        let classifier = binary(vec![stump(0, 1.0, 0.0, 0.0)]);
        assert_eq!(classifier.describe(), "1 trees, binary:logistic, 17 features");
    }
}
