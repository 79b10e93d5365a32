use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::database::models::{
    ContagemCategoria, Pesquisa, PerguntaPesquisa, Resposta, StatusPesquisa, TipoPergunta,
};

#[derive(Debug, Clone, Serialize)]
pub struct ResultadoPesquisa {
    pub pesquisa_id: i64,
    pub titulo: String,
    pub status: StatusPesquisa,
    pub total_entrevistados: i64,
    pub perguntas: Vec<ResultadoPergunta>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultadoPergunta {
    pub pergunta_id: i64,
    pub texto: String,
    pub tipo: TipoPergunta,
    pub total_respostas: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opcoes: Option<Vec<ContagemCategoria>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escala: Option<EstatisticasEscala>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstatisticasEscala {
    pub media: f64,
    pub minimo: i64,
    pub maximo: i64,
}

/// Share of `parte` in `total`, in percent with two decimals.
pub fn percentual(parte: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (parte as f64 * 10_000.0 / total as f64).round() / 100.0
}

pub fn agregar(
    pesquisa: &Pesquisa,
    perguntas: &[PerguntaPesquisa],
    respostas: &[Resposta],
) -> ResultadoPesquisa {
    let entrevistados: HashSet<i64> = respostas.iter().map(|r| r.eleitor_id).collect();

    let perguntas = perguntas
        .iter()
        .map(|pergunta| {
            let valores: Vec<&serde_json::Value> = respostas
                .iter()
                .filter(|r| r.pergunta_id == pergunta.id)
                .map(|r| &r.valor.0)
                .collect();
            agregar_pergunta(pergunta, &valores)
        })
        .collect();

    ResultadoPesquisa {
        pesquisa_id: pesquisa.id,
        titulo: pesquisa.titulo.clone(),
        status: pesquisa.status,
        total_entrevistados: entrevistados.len() as i64,
        perguntas,
    }
}

fn agregar_pergunta(pergunta: &PerguntaPesquisa, valores: &[&serde_json::Value]) -> ResultadoPergunta {
    let total = valores.len() as i64;
    let mut resultado = ResultadoPergunta {
        pergunta_id: pergunta.id,
        texto: pergunta.texto.clone(),
        tipo: pergunta.tipo,
        total_respostas: total,
        opcoes: None,
        escala: None,
    };

    match pergunta.tipo {
        TipoPergunta::UnicaEscolha | TipoPergunta::MultiplaEscolha => {
            let mut contagem: BTreeMap<&str, i64> = BTreeMap::new();
            for valor in valores {
                match valor {
                    serde_json::Value::String(escolha) => {
                        *contagem.entry(escolha.as_str()).or_default() += 1;
                    }
                    serde_json::Value::Array(escolhas) => {
                        for escolha in escolhas.iter().filter_map(|e| e.as_str()) {
                            *contagem.entry(escolha).or_default() += 1;
                        }
                    }
                    _ => {}
                }
            }
            // Multiple choice percentages are relative to respondents and may add up past 100.
            resultado.opcoes = Some(
                pergunta
                    .opcoes
                    .0
                    .iter()
                    .map(|opcao| {
                        let n = contagem.get(opcao.as_str()).copied().unwrap_or(0);
                        ContagemCategoria {
                            categoria: opcao.clone(),
                            total: n,
                            percentual: percentual(n, total),
                        }
                    })
                    .collect(),
            );
        }
        TipoPergunta::SimNao => {
            let sim = valores.iter().filter(|v| v.as_bool() == Some(true)).count() as i64;
            let nao = valores.iter().filter(|v| v.as_bool() == Some(false)).count() as i64;
            resultado.opcoes = Some(vec![
                ContagemCategoria {
                    categoria: "sim".to_string(),
                    total: sim,
                    percentual: percentual(sim, total),
                },
                ContagemCategoria {
                    categoria: "nao".to_string(),
                    total: nao,
                    percentual: percentual(nao, total),
                },
            ]);
        }
        TipoPergunta::Escala => {
            let notas: Vec<i64> = valores.iter().filter_map(|v| v.as_i64()).collect();
            if let (Some(minimo), Some(maximo)) = (notas.iter().min(), notas.iter().max()) {
                let media = notas.iter().sum::<i64>() as f64 / notas.len() as f64;
                resultado.escala = Some(EstatisticasEscala {
                    media: (media * 100.0).round() / 100.0,
                    minimo: *minimo,
                    maximo: *maximo,
                });
            }
        }
        TipoPergunta::Aberta => {}
    }

    resultado
}
