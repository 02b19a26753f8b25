use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// 产品类型枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    /// 音箱
    Speaker,
    /// 功放
    Amplifier,
}

impl ProductType {
    /// 获取标准名称
    pub fn name(self) -> &'static str {
        match self {
            ProductType::Speaker => "speaker",
            ProductType::Amplifier => "amplifier",
        }
    }

    /// 尝试从字符串解析产品类型
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "speaker" | "speakers" | "音箱" => Some(ProductType::Speaker),
            "amplifier" | "amp" | "功放" => Some(ProductType::Amplifier),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProductType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 产品规格记录
///
/// AI 分析器产出的结构化记录。除了下面几个打点字段之外，
/// 内部结构（specifications / soundCharacteristics 等）对核心透明，
/// 原样写入缓存、原样返回调用方。
///
/// 批量响应中的产品名字段是 `product`，单条提取后打点的是
/// `productName`，两者都能反序列化到 `product_name`。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSpec {
    /// 产品名称
    #[serde(default, alias = "product")]
    pub product_name: String,
    /// 产品类型
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_type: Option<ProductType>,
    /// 最后更新时间
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    /// 参与分析的原始帖子数量
    #[serde(default)]
    pub source_count: usize,
    /// AI 产出的其余字段（原样透传）
    #[serde(flatten)]
    pub detail: Map<String, Value>,
}

impl ProductSpec {
    /// 读取 specifications 下的某个字段
    ///
    /// AI 用 "unknown" 表示未提取到的值，这里统一折算为 None。
    pub fn specification(&self, field: &str) -> Option<&str> {
        self.detail
            .get("specifications")?
            .get(field)?
            .as_str()
            .filter(|v| *v != "unknown")
    }

    /// 读取声音签名（warm / neutral / bright / v-shaped）
    pub fn sound_signature(&self) -> Option<&str> {
        self.detail
            .get("soundCharacteristics")?
            .get("signature")?
            .as_str()
            .filter(|v| *v != "unknown")
    }

    /// 数据不足时的兜底规格
    pub fn fallback(product_name: &str) -> Self {
        let detail = json!({
            "specifications": {
                "impedance": "unknown",
                "sensitivity": "unknown",
                "powerHandling": "unknown",
                "frequencyResponse": "unknown",
                "driverType": "unknown",
                "dimensions": "unknown"
            },
            "soundCharacteristics": {
                "signature": "unknown",
                "bassResponse": "unknown",
                "midrange": "unknown",
                "treble": "unknown",
                "soundstage": "unknown",
                "imaging": "unknown"
            },
            "userExperiences": [
                format!("Limited data available for {}", product_name)
            ],
            "compatibilityNotes": [
                "Recommend researching specific requirements"
            ]
        });

        let detail = match detail {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        Self {
            product_name: product_name.to_string(),
            product_type: None,
            last_updated: None,
            source_count: 0,
            detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_type_from_str() {
        assert_eq!(ProductType::from_str("speaker"), Some(ProductType::Speaker));
        assert_eq!(ProductType::from_str("AMP"), Some(ProductType::Amplifier));
        assert_eq!(ProductType::from_str("音箱"), Some(ProductType::Speaker));
        assert_eq!(ProductType::from_str("turntable"), None);
    }

    #[test]
    fn test_spec_accepts_batch_product_field() {
        let spec: ProductSpec = serde_json::from_value(json!({
            "product": "KEF LS50",
            "specs": {"impedance": "8 ohms"}
        }))
        .unwrap();

        assert_eq!(spec.product_name, "KEF LS50");
        assert!(spec.detail.contains_key("specs"));
    }

    #[test]
    fn test_specification_folds_unknown_to_none() {
        let spec = ProductSpec::fallback("KEF LS50");
        assert_eq!(spec.specification("impedance"), None);
        assert_eq!(spec.sound_signature(), None);

        let spec: ProductSpec = serde_json::from_value(json!({
            "productName": "KEF LS50",
            "specifications": {"impedance": "8 ohms"},
            "soundCharacteristics": {"signature": "neutral"}
        }))
        .unwrap();
        assert_eq!(spec.specification("impedance"), Some("8 ohms"));
        assert_eq!(spec.sound_signature(), Some("neutral"));
    }

    #[test]
    fn test_spec_serializes_camel_case() {
        let mut spec = ProductSpec::fallback("KEF LS50");
        spec.product_type = Some(ProductType::Speaker);
        spec.source_count = 3;

        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["productName"], "KEF LS50");
        assert_eq!(value["productType"], "speaker");
        assert_eq!(value["sourceCount"], 3);
        assert!(value.get("specifications").is_some());
    }
}
