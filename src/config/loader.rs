//! Correction plan loader
//! Loads YAML correction plans that describe target distributions for the voter bank

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::PesquisaError;

/// Allowed slack when checking that target percentages add up to 100.
const SOMA_TOLERANCIA: f64 = 0.5;

fn default_tolerancia() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorrectionPlan {
    /// Seed for the random choices; a fresh seed is drawn when absent.
    #[serde(default)]
    pub semente: Option<u64>,
    /// Accepted deviation, in percentage points, before an attribute is corrected.
    #[serde(default = "default_tolerancia")]
    pub tolerancia: f64,
    #[serde(default)]
    pub faixas: Vec<AlvoFaixas>,
    #[serde(default)]
    pub categoricos: Vec<AlvoCategorico>,
    #[serde(default)]
    pub restricoes: Vec<Restricao>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlvoCategorico {
    pub atributo: String,
    #[serde(default)]
    pub tolerancia: Option<f64>,
    pub alvos: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlvoFaixas {
    pub atributo: String,
    #[serde(default)]
    pub tolerancia: Option<f64>,
    pub faixas: Vec<Faixa>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Faixa {
    #[serde(default)]
    pub rotulo: Option<String>,
    pub min: i64,
    pub max: i64,
    #[serde(default)]
    pub percentual: f64,
}

impl Faixa {
    pub fn rotulo(&self) -> String {
        self.rotulo
            .clone()
            .unwrap_or_else(|| format!("{}-{}", self.min, self.max))
    }

    pub fn contains(&self, value: i64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Parses `"16-24,25-34,35-59,60-120"` into bands without target percentages.
    pub fn parse_lista(lista: &str) -> Result<Vec<Faixa>, PesquisaError> {
        lista.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|item| {
                let (min, max) = item.split_once('-').ok_or_else(|| {
                    PesquisaError::ConfigError(format!("Faixa inválida: '{}'", item))
                })?;
                let min = min.trim().parse::<i64>().map_err(|e| {
                    PesquisaError::ConfigError(format!("Faixa inválida '{}': {}", item, e))
                })?;
                let max = max.trim().parse::<i64>().map_err(|e| {
                    PesquisaError::ConfigError(format!("Faixa inválida '{}': {}", item, e))
                })?;
                Ok(Faixa {
                    rotulo: None,
                    min,
                    max,
                    percentual: 0.0,
                })
            })
            .collect()
    }
}

/// Conditional rule: records whose `atributo` equals `valor` must have an age within bounds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Restricao {
    pub atributo: String,
    pub valor: String,
    #[serde(default)]
    pub idade_minima: Option<i64>,
    #[serde(default)]
    pub idade_maxima: Option<i64>,
}

impl Restricao {
    pub fn idade_permitida(&self, idade: i64) -> bool {
        self.idade_minima.map_or(true, |min| idade >= min)
            && self.idade_maxima.map_or(true, |max| idade <= max)
    }
}

impl CorrectionPlan {
    /// Load a plan from a YAML file and validate it
    pub fn load(path: &Path) -> Result<Self, PesquisaError> {
        info!("Loading correction plan from: {:?}", path);

        if !path.exists() {
            return Err(PesquisaError::ConfigError(format!(
                "Correction plan not found: {:?}",
                path
            )));
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            PesquisaError::ConfigError(format!("Failed to read {:?}: {}", path, e))
        })?;

        let plan = Self::from_yaml(&contents)
            .map_err(|e| PesquisaError::ConfigError(format!("{:?}: {}", path, e)))?;

        info!(
            "Loaded plan with {} band target(s), {} categorical target(s), {} constraint(s)",
            plan.faixas.len(),
            plan.categoricos.len(),
            plan.restricoes.len()
        );
        Ok(plan)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, PesquisaError> {
        let plan: CorrectionPlan = serde_yaml::from_str(contents).map_err(|e| {
            PesquisaError::ConfigError(format!("Failed to parse correction plan: {}", e))
        })?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn validate(&self) -> Result<(), PesquisaError> {
        Self::validate_tolerancia(self.tolerancia, "plano")?;

        for alvo in &self.categoricos {
            if let Some(t) = alvo.tolerancia {
                Self::validate_tolerancia(t, &alvo.atributo)?;
            }
            if alvo.alvos.is_empty() {
                return Err(PesquisaError::ConfigError(format!(
                    "Atributo {}: nenhuma categoria alvo definida",
                    alvo.atributo
                )));
            }
            for (categoria, pct) in &alvo.alvos {
                if *pct < 0.0 {
                    return Err(PesquisaError::ConfigError(format!(
                        "Atributo {}: percentual negativo para '{}' ({})",
                        alvo.atributo, categoria, pct
                    )));
                }
            }
            Self::validate_soma(&alvo.atributo, alvo.alvos.values().copied())?;
        }

        for alvo in &self.faixas {
            if let Some(t) = alvo.tolerancia {
                Self::validate_tolerancia(t, &alvo.atributo)?;
            }
            if alvo.faixas.is_empty() {
                return Err(PesquisaError::ConfigError(format!(
                    "Atributo {}: nenhuma faixa definida",
                    alvo.atributo
                )));
            }
            for faixa in &alvo.faixas {
                if faixa.min > faixa.max {
                    return Err(PesquisaError::ConfigError(format!(
                        "Atributo {}: faixa {} com min > max",
                        alvo.atributo,
                        faixa.rotulo()
                    )));
                }
                if faixa.percentual < 0.0 {
                    return Err(PesquisaError::ConfigError(format!(
                        "Atributo {}: percentual negativo na faixa {}",
                        alvo.atributo,
                        faixa.rotulo()
                    )));
                }
            }
            let mut ordenadas: Vec<&Faixa> = alvo.faixas.iter().collect();
            ordenadas.sort_by_key(|f| f.min);
            for par in ordenadas.windows(2) {
                if par[1].min <= par[0].max {
                    return Err(PesquisaError::ConfigError(format!(
                        "Atributo {}: faixas {} e {} se sobrepõem",
                        alvo.atributo,
                        par[0].rotulo(),
                        par[1].rotulo()
                    )));
                }
            }
            Self::validate_soma(&alvo.atributo, alvo.faixas.iter().map(|f| f.percentual))?;
        }

        for restricao in &self.restricoes {
            if let (Some(min), Some(max)) = (restricao.idade_minima, restricao.idade_maxima) {
                if min > max {
                    return Err(PesquisaError::ConfigError(format!(
                        "Restrição {}={}: idade_minima > idade_maxima",
                        restricao.atributo, restricao.valor
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn tolerancia_para(&self, atributo_tolerancia: Option<f64>) -> f64 {
        atributo_tolerancia.unwrap_or(self.tolerancia)
    }

    fn validate_tolerancia(tolerancia: f64, nome: &str) -> Result<(), PesquisaError> {
        if !(0.0..=100.0).contains(&tolerancia) {
            return Err(PesquisaError::ConfigError(format!(
                "{}: tolerância {} fora do intervalo [0, 100]",
                nome, tolerancia
            )));
        }
        Ok(())
    }

    fn validate_soma(atributo: &str, valores: impl Iterator<Item = f64>) -> Result<(), PesquisaError> {
        let soma: f64 = valores.sum();
        if (soma - 100.0).abs() > SOMA_TOLERANCIA {
            return Err(PesquisaError::ConfigError(format!(
                "Atributo {}: percentuais somam {:.2}, esperado 100",
                atributo, soma
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLANO: &str = r#"
semente: 42
tolerancia: 1.5
faixas:
  - atributo: idade
    faixas:
      - { min: 16, max: 24, percentual: 15 }
      - { min: 25, max: 59, percentual: 65 }
      - { rotulo: "60+", min: 60, max: 100, percentual: 20 }
categoricos:
  - atributo: orientacao_politica
    alvos:
      esquerda: 30
      centro: 40
      direita: 30
restricoes:
  - atributo: ocupacao
    valor: aposentado
    idade_minima: 50
"#;

    #[test]
    fn test_parse_plan() {
        let plan = CorrectionPlan::from_yaml(PLANO).unwrap();
        assert_eq!(plan.semente, Some(42));
        assert_eq!(plan.tolerancia, 1.5);
        assert_eq!(plan.faixas[0].faixas.len(), 3);
        assert_eq!(plan.faixas[0].faixas[2].rotulo(), "60+");
        assert_eq!(plan.faixas[0].faixas[0].rotulo(), "16-24");
        assert_eq!(plan.categoricos[0].alvos["centro"], 40.0);
        assert!(!plan.restricoes[0].idade_permitida(30));
        assert!(plan.restricoes[0].idade_permitida(65));
    }

    #[test]
    fn test_rejects_bad_sum() {
        let yaml = r#"
categoricos:
  - atributo: genero
    alvos: { masculino: 40, feminino: 40 }
"#;
        assert!(CorrectionPlan::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_rejects_overlapping_bands() {
        let yaml = r#"
faixas:
  - atributo: idade
    faixas:
      - { min: 16, max: 30, percentual: 50 }
      - { min: 30, max: 60, percentual: 50 }
"#;
        let err = CorrectionPlan::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("sobrepõem"));
    }

    #[test]
    fn test_parse_faixa_list() {
        let faixas = Faixa::parse_lista("16-24, 25-34,35-120").unwrap();
        assert_eq!(faixas.len(), 3);
        assert!(faixas[1].contains(30));
        assert!(Faixa::parse_lista("16_24").is_err());
    }
}
