//! Poll lifecycle rules, answer validation and results aggregation.

pub mod resultados;
pub mod validacao;

use crate::database::models::StatusPesquisa;

impl StatusPesquisa {
    /// `rascunho -> ativa <-> pausada -> encerrada`; `ativa -> encerrada` is also allowed.
    pub fn can_transition_to(&self, destino: StatusPesquisa) -> bool {
        use StatusPesquisa::*;
        matches!(
            (self, destino),
            (Rascunho, Ativa) | (Ativa, Pausada) | (Pausada, Ativa) | (Ativa, Encerrada) | (Pausada, Encerrada)
        )
    }

    /// Questions can only be changed before fieldwork starts.
    pub fn editavel(&self) -> bool {
        matches!(self, StatusPesquisa::Rascunho)
    }

    pub fn aceita_respostas(&self) -> bool {
        matches!(self, StatusPesquisa::Ativa)
    }
}
