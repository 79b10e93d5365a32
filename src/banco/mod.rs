//! Voter bank
//!
//! The voter bank is a flat JSON array of synthetic voter records. This module
//! loads and saves it, measures its distributions against a correction plan,
//! and rebalances it towards target distributions.

pub mod correcao;
pub mod distribuicao;
pub mod validacao;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::database::models::{Genero, NovoEleitor, OrientacaoPolitica};
use crate::error::PesquisaError;

pub use correcao::{Alteracao, Correcao, RelatorioCorrecao};
pub use distribuicao::{LinhaRelatorio, RelatorioAtributo};
pub use validacao::Violacao;

pub type Registro = Map<String, Value>;

/// Category label used for missing or null values.
pub const AUSENTE: &str = "(ausente)";

pub const IDADE: &str = "idade";
pub const IDADE_MINIMA: i64 = 16;
pub const IDADE_MAXIMA: i64 = 120;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BancoEleitores {
    registros: Vec<Registro>,
}

impl BancoEleitores {
    pub fn from_registros(registros: Vec<Registro>) -> Self {
        Self { registros }
    }

    pub fn from_json(contents: &str) -> Result<Self, PesquisaError> {
        let value: Value = serde_json::from_str(contents)?;
        let Value::Array(items) = value else {
            return Err(PesquisaError::BancoError(
                "O banco de eleitores deve ser uma lista JSON".to_string(),
            ));
        };

        let registros = items
            .into_iter()
            .enumerate()
            .map(|(indice, item)| match item {
                Value::Object(map) => Ok(map),
                _ => Err(PesquisaError::BancoError(format!(
                    "Registro {} não é um objeto JSON",
                    indice
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { registros })
    }

    pub fn load(path: &Path) -> Result<Self, PesquisaError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            PesquisaError::BancoError(format!("Failed to read {:?}: {}", path, e))
        })?;
        let banco = Self::from_json(&contents)?;
        info!("Loaded {} records from {:?}", banco.len(), path);
        Ok(banco)
    }

    /// Writes to a sibling temp file and renames it over `path`, keeping `<path>.bak` when asked.
    pub fn save(&self, path: &Path, backup: bool) -> Result<(), PesquisaError> {
        let json = serde_json::to_string_pretty(&self.registros)?;

        if backup && path.exists() {
            let backup_path = sufixo(path, ".bak");
            fs::copy(path, &backup_path)?;
            debug!("Backup written to {:?}", backup_path);
        }

        let tmp_path = sufixo(path, ".tmp");
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, path)?;

        info!("Saved {} records to {:?}", self.len(), path);
        Ok(())
    }

    pub fn registros(&self) -> &[Registro] {
        &self.registros
    }

    pub fn len(&self) -> usize {
        self.registros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registros.is_empty()
    }

    /// `sha256:<hex>` fingerprint of the serialized records.
    pub fn content_hash(&self) -> String {
        let bytes = serde_json::to_vec(&self.registros).unwrap_or_default();
        format!("sha256:{}", hex::encode(Sha256::digest(&bytes)))
    }

    /// Converts every record into an insertable voter; fields without a column go to `atributos`.
    pub fn para_eleitores(&self) -> Result<Vec<NovoEleitor>, PesquisaError> {
        self.registros
            .iter()
            .enumerate()
            .map(|(indice, registro)| {
                registro_para_eleitor(registro).map_err(|e| {
                    PesquisaError::BancoError(format!("Registro {}: {}", indice, e))
                })
            })
            .collect()
    }
}

fn sufixo(path: &Path, extra: &str) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(extra);
    PathBuf::from(os)
}

/// Category of a record for `atributo`: strings as-is, numbers and booleans as text.
pub fn valor_categoria(registro: &Registro, atributo: &str) -> String {
    match registro.get(atributo) {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => AUSENTE.to_string(),
    }
}

/// Integer value of a numeric attribute; numeric strings are accepted and fractions truncated.
pub fn valor_numerico(registro: &Registro, atributo: &str) -> Option<i64> {
    match registro.get(atributo)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.trunc() as i64),
        _ => None,
    }
}

const CAMPOS_ELEITOR: &[&str] = &[
    "nome",
    "idade",
    "genero",
    "cor_raca",
    "regiao_administrativa",
    "escolaridade",
    "faixa_renda",
    "ocupacao",
    "religiao",
    "orientacao_politica",
    "interesse_politico",
    "estado_civil",
];

fn normalizar_enum(texto: &str) -> String {
    texto.trim().to_lowercase().replace(['-', ' '], "_")
}

fn texto_opcional(registro: &Registro, campo: &str) -> Option<String> {
    match valor_categoria(registro, campo) {
        v if v == AUSENTE => None,
        v => Some(v),
    }
}

pub fn registro_para_eleitor(registro: &Registro) -> Result<NovoEleitor, PesquisaError> {
    let nome = texto_opcional(registro, "nome")
        .ok_or_else(|| PesquisaError::ValidationError("campo 'nome' ausente".to_string()))?;
    let idade = valor_numerico(registro, IDADE)
        .ok_or_else(|| PesquisaError::ValidationError("campo 'idade' ausente".to_string()))?;
    let genero: Genero = texto_opcional(registro, "genero")
        .map(|v| normalizar_enum(&v))
        .ok_or_else(|| PesquisaError::ValidationError("campo 'genero' ausente".to_string()))?
        .parse()?;
    let orientacao_politica: OrientacaoPolitica = texto_opcional(registro, "orientacao_politica")
        .map(|v| normalizar_enum(&v))
        .ok_or_else(|| {
            PesquisaError::ValidationError("campo 'orientacao_politica' ausente".to_string())
        })?
        .parse()?;

    let atributos: Map<String, Value> = registro
        .iter()
        .filter(|(chave, _)| !CAMPOS_ELEITOR.contains(&chave.as_str()))
        .map(|(chave, valor)| (chave.clone(), valor.clone()))
        .collect();

    Ok(NovoEleitor {
        nome,
        idade,
        genero,
        cor_raca: texto_opcional(registro, "cor_raca"),
        regiao_administrativa: texto_opcional(registro, "regiao_administrativa"),
        escolaridade: texto_opcional(registro, "escolaridade"),
        faixa_renda: texto_opcional(registro, "faixa_renda"),
        ocupacao: texto_opcional(registro, "ocupacao"),
        religiao: texto_opcional(registro, "religiao"),
        orientacao_politica,
        interesse_politico: texto_opcional(registro, "interesse_politico"),
        estado_civil: texto_opcional(registro, "estado_civil"),
        atributos,
    })
}
