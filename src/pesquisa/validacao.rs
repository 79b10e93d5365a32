use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::database::models::{NovaPergunta, PerguntaPesquisa, RespostaItem, TipoPergunta};
use crate::error::PesquisaError;

pub const ESCALA_PADRAO: (i64, i64) = (0, 10);

/// Scale questions store their bounds as `["min", "max"]`; an empty list means 0..=10.
pub fn escala_limites(opcoes: &[String]) -> Result<(i64, i64), PesquisaError> {
    match opcoes {
        [] => Ok(ESCALA_PADRAO),
        [min, max] => {
            let min = min.trim().parse::<i64>().map_err(|_| {
                PesquisaError::ValidationError(format!("Limite mínimo de escala inválido: '{}'", min))
            })?;
            let max = max.trim().parse::<i64>().map_err(|_| {
                PesquisaError::ValidationError(format!("Limite máximo de escala inválido: '{}'", max))
            })?;
            if min >= max {
                return Err(PesquisaError::ValidationError(format!(
                    "Escala inválida: mínimo {} deve ser menor que máximo {}",
                    min, max
                )));
            }
            Ok((min, max))
        }
        _ => Err(PesquisaError::ValidationError(
            "Perguntas de escala aceitam apenas [mínimo, máximo] como opções".to_string(),
        )),
    }
}

pub fn validar_pergunta(nova: &NovaPergunta) -> Result<(), PesquisaError> {
    match nova.tipo {
        TipoPergunta::UnicaEscolha | TipoPergunta::MultiplaEscolha => {
            if nova.opcoes.len() < 2 {
                return Err(PesquisaError::ValidationError(
                    "Perguntas de escolha precisam de pelo menos duas opções".to_string(),
                ));
            }
            let mut vistas = HashSet::new();
            for opcao in &nova.opcoes {
                if opcao.trim().is_empty() {
                    return Err(PesquisaError::ValidationError(
                        "Opções não podem ser vazias".to_string(),
                    ));
                }
                if !vistas.insert(opcao.trim()) {
                    return Err(PesquisaError::ValidationError(format!(
                        "Opção duplicada: '{}'",
                        opcao
                    )));
                }
            }
        }
        TipoPergunta::Escala => {
            escala_limites(&nova.opcoes)?;
        }
        TipoPergunta::Aberta | TipoPergunta::SimNao => {
            if !nova.opcoes.is_empty() {
                return Err(PesquisaError::ValidationError(format!(
                    "Perguntas do tipo {} não aceitam opções",
                    nova.tipo
                )));
            }
        }
    }
    Ok(())
}

pub fn validar_valor(pergunta: &PerguntaPesquisa, valor: &Value) -> Result<(), PesquisaError> {
    let invalido = |motivo: &str| {
        Err(PesquisaError::ValidationError(format!(
            "Resposta inválida para a pergunta {}: {}",
            pergunta.id, motivo
        )))
    };

    match pergunta.tipo {
        TipoPergunta::Aberta => match valor.as_str() {
            Some(texto) if !texto.trim().is_empty() => Ok(()),
            _ => invalido("esperado texto não vazio"),
        },
        TipoPergunta::UnicaEscolha => match valor.as_str() {
            Some(escolha) if pergunta.opcoes.0.iter().any(|o| o == escolha) => Ok(()),
            Some(escolha) => invalido(&format!("opção '{}' não existe", escolha)),
            None => invalido("esperada uma opção"),
        },
        TipoPergunta::MultiplaEscolha => {
            let Some(escolhas) = valor.as_array() else {
                return invalido("esperada uma lista de opções");
            };
            if escolhas.is_empty() {
                return invalido("nenhuma opção escolhida");
            }
            let mut vistas = HashSet::new();
            for escolha in escolhas {
                let Some(escolha) = escolha.as_str() else {
                    return invalido("opções devem ser texto");
                };
                if !pergunta.opcoes.0.iter().any(|o| o == escolha) {
                    return invalido(&format!("opção '{}' não existe", escolha));
                }
                if !vistas.insert(escolha) {
                    return invalido(&format!("opção '{}' repetida", escolha));
                }
            }
            Ok(())
        }
        TipoPergunta::Escala => {
            let (min, max) = escala_limites(&pergunta.opcoes.0)?;
            match valor.as_i64() {
                Some(nota) if (min..=max).contains(&nota) => Ok(()),
                Some(nota) => invalido(&format!("nota {} fora da escala {}..={}", nota, min, max)),
                None => invalido("esperado número inteiro"),
            }
        }
        TipoPergunta::SimNao => match valor {
            Value::Bool(_) => Ok(()),
            _ => invalido("esperado verdadeiro ou falso"),
        },
    }
}

/// Checks a full interview against the poll's questions and returns the answers to store.
pub fn validar_entrevista<'a>(
    perguntas: &[PerguntaPesquisa],
    respostas: &'a [RespostaItem],
) -> Result<Vec<&'a RespostaItem>, PesquisaError> {
    let por_id: HashMap<i64, &PerguntaPesquisa> = perguntas.iter().map(|p| (p.id, p)).collect();
    let mut respondidas = HashSet::new();
    let mut aceitas = Vec::with_capacity(respostas.len());

    for resposta in respostas {
        let pergunta = por_id.get(&resposta.pergunta_id).ok_or_else(|| {
            PesquisaError::ValidationError(format!(
                "Pergunta {} não pertence a esta pesquisa",
                resposta.pergunta_id
            ))
        })?;
        if !respondidas.insert(resposta.pergunta_id) {
            return Err(PesquisaError::ValidationError(format!(
                "Pergunta {} respondida mais de uma vez",
                resposta.pergunta_id
            )));
        }
        if resposta.valor.is_null() {
            continue;
        }
        validar_valor(pergunta, &resposta.valor)?;
        aceitas.push(resposta);
    }

    let faltando: Vec<String> = perguntas
        .iter()
        .filter(|p| p.obrigatoria)
        .filter(|p| !aceitas.iter().any(|r| r.pergunta_id == p.id))
        .map(|p| p.id.to_string())
        .collect();
    if !faltando.is_empty() {
        return Err(PesquisaError::ValidationError(format!(
            "Perguntas obrigatórias sem resposta: {}",
            faltando.join(", ")
        )));
    }

    if aceitas.is_empty() {
        return Err(PesquisaError::ValidationError(
            "Entrevista sem respostas".to_string(),
        ));
    }

    Ok(aceitas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use sqlx::types::Json;

    fn pergunta(id: i64, tipo: TipoPergunta, opcoes: &[&str], obrigatoria: bool) -> PerguntaPesquisa {
        PerguntaPesquisa {
            id,
            pesquisa_id: 1,
            ordem: id,
            texto: format!("Pergunta {}", id),
            tipo,
            opcoes: Json(opcoes.iter().map(|o| o.to_string()).collect()),
            obrigatoria,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_validar_valor_by_type() {
        let unica = pergunta(1, TipoPergunta::UnicaEscolha, &["A", "B"], true);
        assert!(validar_valor(&unica, &json!("A")).is_ok());
        assert!(validar_valor(&unica, &json!("C")).is_err());
        assert!(validar_valor(&unica, &json!(1)).is_err());

        let multipla = pergunta(2, TipoPergunta::MultiplaEscolha, &["A", "B", "C"], true);
        assert!(validar_valor(&multipla, &json!(["A", "C"])).is_ok());
        assert!(validar_valor(&multipla, &json!(["A", "A"])).is_err());
        assert!(validar_valor(&multipla, &json!([])).is_err());

        let escala = pergunta(3, TipoPergunta::Escala, &["1", "5"], true);
        assert!(validar_valor(&escala, &json!(5)).is_ok());
        assert!(validar_valor(&escala, &json!(6)).is_err());

        let padrao = pergunta(4, TipoPergunta::Escala, &[], true);
        assert!(validar_valor(&padrao, &json!(0)).is_ok());
        assert!(validar_valor(&padrao, &json!(10)).is_ok());

        let sim_nao = pergunta(5, TipoPergunta::SimNao, &[], true);
        assert!(validar_valor(&sim_nao, &json!(true)).is_ok());
        assert!(validar_valor(&sim_nao, &json!("sim")).is_err());

        let aberta = pergunta(6, TipoPergunta::Aberta, &[], true);
        assert!(validar_valor(&aberta, &json!("Saúde")).is_ok());
        assert!(validar_valor(&aberta, &json!("   ")).is_err());
    }

    #[test]
    fn test_validar_pergunta() {
        let mut nova = NovaPergunta {
            texto: "Em quem você votaria?".to_string(),
            tipo: TipoPergunta::UnicaEscolha,
            opcoes: vec!["A".to_string()],
            obrigatoria: true,
            ordem: None,
        };
        assert!(validar_pergunta(&nova).is_err());

        nova.opcoes.push("B".to_string());
        assert!(validar_pergunta(&nova).is_ok());

        nova.tipo = TipoPergunta::Escala;
        assert!(validar_pergunta(&nova).is_err());
        nova.opcoes = vec!["5".to_string(), "1".to_string()];
        assert!(validar_pergunta(&nova).is_err());
    }

    #[test]
    fn test_validar_entrevista_required_and_foreign() {
        let perguntas = vec![
            pergunta(1, TipoPergunta::SimNao, &[], true),
            pergunta(2, TipoPergunta::Aberta, &[], false),
        ];

        let ok = vec![RespostaItem { pergunta_id: 1, valor: json!(false) }];
        assert_eq!(validar_entrevista(&perguntas, &ok).unwrap().len(), 1);

        let faltando = vec![RespostaItem { pergunta_id: 2, valor: json!("texto") }];
        assert!(validar_entrevista(&perguntas, &faltando).is_err());

        let estrangeira = vec![
            RespostaItem { pergunta_id: 1, valor: json!(true) },
            RespostaItem { pergunta_id: 99, valor: json!(true) },
        ];
        assert!(validar_entrevista(&perguntas, &estrangeira).is_err());

        let repetida = vec![
            RespostaItem { pergunta_id: 1, valor: json!(true) },
            RespostaItem { pergunta_id: 1, valor: json!(false) },
        ];
        assert!(validar_entrevista(&perguntas, &repetida).is_err());
    }
}
