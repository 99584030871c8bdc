//! The interaction loop between a protocol function, its state and a remote
//! peer. Performs no I/O itself, requests go through a [`Transport`].

use crate::{
    modem::{demodulate_value, modulate_value, CodecError},
    world::{
        value::{Integer, Value},
        ExprRef,
    },
};

use super::{
    interpreter::{EvalError, Interpreter},
    BoxError,
};

pub type Point = (Integer, Integer);
pub type Image = Vec<Point>;

/// Sends a modulated request and returns the modulated response
pub trait Transport {
    fn send(&mut self, request: &str) -> Result<String, BoxError>;
}

impl<F> Transport for F
where
    F: FnMut(&str) -> Result<String, BoxError>,
{
    fn send(&mut self, request: &str) -> Result<String, BoxError> {
        self(request)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("transport failed: {0}")]
    Transport(BoxError),
    #[error("expected a list of images made of (x, y) points, found {0}")]
    MalformedImages(Box<str>),
}

/// Drives a protocol function `ap ap protocol state point`.
///
/// Each result is a 3-element list `[flag, new_state, data]`. A zero flag
/// ends the click and `data` holds the images to draw; any other flag sends
/// `data` to the peer and feeds the response back in as the next point.
#[derive(Debug, Clone)]
pub struct Protocol {
    protocol: ExprRef,
    state: Value,
    history: Vec<Value>,
}

impl Protocol {
    /// `name` is the symbol the protocol function is bound to
    pub fn new(interpreter: &mut Interpreter, name: &str) -> Self {
        Self {
            protocol: interpreter.world_mut().intern_symbol(name),
            state: Value::Nil,
            history: vec![],
        }
    }

    pub fn state(&self) -> &Value {
        &self.state
    }

    /// Number of clicks that can be undone
    pub fn depth(&self) -> usize {
        self.history.len()
    }

    /// Restores the state from before the last successful click
    pub fn undo(&mut self) -> bool {
        match self.history.pop() {
            Some(state) => {
                self.state = state;
                true
            }
            None => false,
        }
    }

    /// Runs one round of the protocol function
    pub fn step(
        &self,
        interpreter: &mut Interpreter,
        state: &Value,
        input: &Value,
    ) -> Result<(Integer, Value, Value), EvalError> {
        let world = interpreter.world_mut();
        let state = world.intern_value(state);
        let input = world.intern_value(input);
        let call = world.intern_application2(self.protocol, state, input);
        let result = interpreter.force_value(call)?;
        let shape_error = || EvalError::UnexpectedShape {
            expected: "a [flag, state, data] list",
            found: result.to_string().into(),
        };
        let Some([flag, state, data]) = result.as_list().and_then(|items| <[&Value; 3]>::try_from(items).ok())
        else {
            return Err(shape_error());
        };
        let flag = flag.as_integer().ok_or_else(shape_error)?;
        Ok((flag, state.clone(), data.clone()))
    }

    /// Clicks at `point` and returns the images to draw. The state only
    /// changes if the whole exchange succeeds.
    pub fn click(
        &mut self,
        interpreter: &mut Interpreter,
        point: Point,
        transport: &mut dyn Transport,
    ) -> Result<Vec<Image>, ProtocolError> {
        let mut state = self.state.clone();
        let mut input = Value::from(point);
        let mut round = 0u64;
        loop {
            let (flag, new_state, data) = self.step(interpreter, &state, &input)?;
            tracing::debug!(round, flag, state = %new_state, "protocol step");
            state = new_state;
            if flag == 0 {
                let images = images(&data)?;
                self.history.push(std::mem::replace(&mut self.state, state));
                return Ok(images);
            }
            let response = transport
                .send(&modulate_value(&data))
                .map_err(ProtocolError::Transport)?;
            input = demodulate_value(response.trim())?;
            round += 1;
        }
    }
}

/// Reads a list of images, each a list of `(x, y)` points
pub fn images(data: &Value) -> Result<Vec<Image>, ProtocolError> {
    let malformed = || ProtocolError::MalformedImages(data.to_string().into());
    let images = data.as_list().ok_or_else(malformed)?;
    images
        .into_iter()
        .map(|image| -> Result<Image, ProtocolError> {
            let points = image.as_list().ok_or_else(malformed)?;
            points
                .into_iter()
                .map(|point| match point.as_pair() {
                    Some((Value::Integer(x), Value::Integer(y))) => Ok((*x, *y)),
                    _ => Err(malformed()),
                })
                .collect()
        })
        .collect()
}
