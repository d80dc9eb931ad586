// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 模型元数据: 输入尺寸校验、类别表解析、期望输出形状

use regex::Regex;

use super::ModelInfo;
use crate::detection::ClassMap;
use crate::error::{Error, Result};

/// 支持的固定输入尺寸
pub const SUPPORTED_SIZES: [u32; 6] = [640, 512, 416, 320, 256, 160];

/// YOLOv8 三个检测头的步长
const STRIDES: [u32; 3] = [8, 16, 32];

/// 元数据缺失时的默认类别
pub const DEFAULT_CLASS: &str = "enemy";

pub fn is_supported_size(size: u32) -> bool {
    SUPPORTED_SIZES.contains(&size)
}

/// 检测槽位数: Σ (size / stride)²  (640 → 8400)
pub fn num_detections(size: u32) -> usize {
    STRIDES
        .iter()
        .map(|s| ((size / s) * (size / s)) as usize)
        .sum()
}

pub fn default_class_map() -> ClassMap {
    let mut map = ClassMap::new();
    map.insert(0, DEFAULT_CLASS.to_string());
    map
}

/// 解析 `names` 元数据
///
/// 两种格式:
/// - JSON 对象: `{"0": "person", "1": "car"}`
/// - Ultralytics 导出的 Python 字典: `{0: 'person', 1: 'car'}`
pub fn parse_class_names(raw: &str) -> Option<ClassMap> {
    if let Ok(map) = serde_json::from_str::<std::collections::BTreeMap<String, String>>(raw) {
        let parsed: ClassMap = map
            .into_iter()
            .filter_map(|(k, v)| k.trim().parse::<usize>().ok().map(|id| (id, v)))
            .collect();
        if !parsed.is_empty() {
            return Some(parsed);
        }
    }

    let re = Regex::new(r#"(\d+)\s*:\s*['"]([^'"]*)['"]"#).ok()?;
    let parsed: ClassMap = re
        .captures_iter(raw)
        .filter_map(|c| {
            let id = c.get(1)?.as_str().parse::<usize>().ok()?;
            Some((id, c.get(2)?.as_str().to_string()))
        })
        .collect();
    (!parsed.is_empty()).then_some(parsed)
}

/// 类别数 = 最大ID + 1
pub fn num_classes(map: &ClassMap) -> usize {
    map.keys().next_back().map_or(1, |&id| id + 1)
}

fn fill_class_map(num_classes: usize) -> ClassMap {
    if num_classes <= 1 {
        return default_class_map();
    }
    (0..num_classes).map(|id| (id, format!("Class_{}", id))).collect()
}

/// 由 ONNX 输入/输出维度和 `names` 元数据推导模型信息
///
/// - `input_dims`: 期望 [1, 3, S, S]; 含负数 (-1) 的维度表示动态尺寸
/// - `output_dims`: 固定模型必须等于 [1, 4+C, N]
/// - `configured_size`: 动态模型使用的输入尺寸
pub fn resolve_model_info(
    input_dims: &[i64],
    output_dims: &[i64],
    names: Option<&str>,
    configured_size: u32,
) -> Result<ModelInfo> {
    let dynamic = input_dims.iter().any(|d| *d < 0);

    let image_size = if dynamic {
        configured_size
    } else {
        if input_dims.len() != 4 || input_dims[2] != input_dims[3] {
            return Err(Error::Metadata(format!(
                "expected square [1, 3, S, S] input, got {:?}",
                input_dims
            )));
        }
        input_dims[2] as u32
    };
    if !is_supported_size(image_size) {
        return Err(Error::UnsupportedInputSize(image_size));
    }

    // 输出的类别维度 (若已知)
    let output_classes = match output_dims.get(1) {
        Some(&c) if c > 4 => Some(c as usize - 4),
        _ => None,
    };

    let class_map = match names.and_then(parse_class_names) {
        Some(map) => map,
        None => fill_class_map(output_classes.unwrap_or(1)),
    };
    let num_classes = num_classes(&class_map);
    let num_detections = num_detections(image_size);

    let fixed_output = output_dims.len() == 3 && output_dims.iter().all(|d| *d >= 0);
    if !dynamic && fixed_output {
        let expected = [1, 4 + num_classes as i64, num_detections as i64];
        if output_dims != &expected[..] {
            return Err(Error::OutputShape {
                expected: format!("{:?}", expected),
                actual: output_dims.iter().map(|d| *d as usize).collect(),
            });
        }
    }

    Ok(ModelInfo {
        image_size,
        num_detections,
        num_classes,
        class_map,
        dynamic,
    })
}
