use ndarray::prelude::*;
use ndarray::s;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::{Activation, ModelConfig, OptimizerKind, Padding};
use crate::errors::*;
use crate::models::ClassifierModel;

const ADAM_BETA1: f32 = 0.9;
const ADAM_BETA2: f32 = 0.999;
const ADAM_EPSILON: f32 = 1e-7;
const POOL_SIZE: usize = 2;

/// Convolutional text classifier: embedding, two conv/max-pool blocks, a
/// global max pool and three dense layers ending in `num_labels` logits.
/// The loss is sparse categorical cross-entropy computed from the raw
/// logits; probabilities are the softmax of the logits.
pub struct TextCnn {
    config: ModelConfig,
    vocab_size: usize,
    num_labels: usize,
    embedding: Param,
    conv1_weights: Param,
    conv1_bias: Param,
    conv2_weights: Param,
    conv2_bias: Param,
    dense1_weights: Param,
    dense1_bias: Param,
    dense2_weights: Param,
    dense2_bias: Param,
    output_weights: Param,
    output_bias: Param,
    step_count: usize,
}

/// One weight tensor with its gradient accumulator and Adam moments.
struct Param {
    value: ArrayD<f32>,
    grad: ArrayD<f32>,
    first_moment: ArrayD<f32>,
    second_moment: ArrayD<f32>,
}

impl Param {
    fn new(value: ArrayD<f32>) -> Self {
        let dim = value.raw_dim();
        Self {
            value,
            grad: ArrayD::zeros(dim.clone()),
            first_moment: ArrayD::zeros(dim.clone()),
            second_moment: ArrayD::zeros(dim),
        }
    }

    fn matrix(&self) -> ArrayView2<f32> {
        self.value.view().into_dimensionality().unwrap()
    }

    fn vector(&self) -> ArrayView1<f32> {
        self.value.view().into_dimensionality().unwrap()
    }

    fn zero_grad(&mut self) {
        self.grad.fill(0.0);
    }

    fn apply_update(&mut self, optimizer: OptimizerKind, learning_rate: f32, step: usize, scale: f32) {
        match optimizer {
            OptimizerKind::Adam => {
                let bias1 = 1.0 - ADAM_BETA1.powi(step as i32);
                let bias2 = 1.0 - ADAM_BETA2.powi(step as i32);
                ndarray::Zip::from(&mut self.value)
                    .and(&mut self.first_moment)
                    .and(&mut self.second_moment)
                    .and(&self.grad)
                    .for_each(|value, first, second, grad| {
                        let grad = grad * scale;
                        *first = ADAM_BETA1 * *first + (1.0 - ADAM_BETA1) * grad;
                        *second = ADAM_BETA2 * *second + (1.0 - ADAM_BETA2) * grad * grad;
                        let first_hat = *first / bias1;
                        let second_hat = *second / bias2;
                        *value -= learning_rate * first_hat / (second_hat.sqrt() + ADAM_EPSILON);
                    });
            }
            OptimizerKind::Sgd => {
                ndarray::Zip::from(&mut self.value)
                    .and(&self.grad)
                    .for_each(|value, grad| {
                        *value -= learning_rate * grad * scale;
                    });
            }
        }
    }
}

struct ConvCache {
    columns: Array2<f32>,
    pre_activation: Array2<f32>,
    activated: Array2<f32>,
    input_len: usize,
    pad_left: usize,
}

struct PoolCache {
    argmax: Array2<usize>,
    output: Array2<f32>,
    input_len: usize,
}

struct DenseCache {
    pre_activation: Array1<f32>,
    output: Array1<f32>,
}

struct ForwardPass {
    sequence: Vec<usize>,
    conv1: ConvCache,
    pool1: PoolCache,
    conv2: ConvCache,
    pool2: PoolCache,
    global_argmax: Vec<Option<usize>>,
    global_output: Array1<f32>,
    dense1: DenseCache,
    drop1: Option<Array1<f32>>,
    dense2: DenseCache,
    drop2: Option<Array1<f32>>,
    logits: Array1<f32>,
}

impl TextCnn {
    pub fn new(
        vocab_size: usize,
        num_labels: usize,
        config: &ModelConfig,
        rng: &mut StdRng,
    ) -> Self {
        let embedding_dim = config.embedding_dim;
        let filters = config.filters;
        let kernel = config.kernel_size;
        let units = config.units;

        let embedding = Param::new(uniform_init(vocab_size, embedding_dim, 0.05, rng));
        let conv1_weights = Param::new(glorot_init(kernel * embedding_dim, filters, rng));
        let conv1_bias = Param::new(ArrayD::zeros(IxDyn(&[filters])));
        let conv2_weights = Param::new(glorot_init(kernel * filters, 2 * filters, rng));
        let conv2_bias = Param::new(ArrayD::zeros(IxDyn(&[2 * filters])));
        let dense1_weights = Param::new(glorot_init(2 * filters, 2 * units, rng));
        let dense1_bias = Param::new(ArrayD::zeros(IxDyn(&[2 * units])));
        let dense2_weights = Param::new(glorot_init(2 * units, units, rng));
        let dense2_bias = Param::new(ArrayD::zeros(IxDyn(&[units])));
        let output_weights = Param::new(glorot_init(units, num_labels, rng));
        let output_bias = Param::new(ArrayD::zeros(IxDyn(&[num_labels])));

        Self {
            config: config.clone(),
            vocab_size,
            num_labels,
            embedding,
            conv1_weights,
            conv1_bias,
            conv2_weights,
            conv2_bias,
            dense1_weights,
            dense1_bias,
            dense2_weights,
            dense2_bias,
            output_weights,
            output_bias,
            step_count: 0,
        }
    }

    pub fn num_labels(&self) -> usize {
        self.num_labels
    }

    /// Trains on shuffled minibatches for the given number of epochs.
    pub fn fit(
        &mut self,
        sequences: &[Vec<usize>],
        labels: &[usize],
        epochs: usize,
        batch_size: usize,
        learning_rate: f32,
        rng: &mut StdRng,
    ) -> Result<()> {
        if sequences.len() != labels.len() {
            return Err(JobQueueNluError::InternalError(format!(
                "Sequence/label count mismatch: {} vs {}",
                sequences.len(),
                labels.len()
            ))
            .into());
        }
        let batch_size = batch_size.max(1);
        let mut indices: Vec<usize> = (0..sequences.len()).collect();
        for epoch in 0..epochs {
            indices.shuffle(rng);
            let mut epoch_loss = 0.0;
            for batch in indices.chunks(batch_size) {
                let batch_sequences: Vec<&Vec<usize>> =
                    batch.iter().map(|&ix| &sequences[ix]).collect();
                let batch_labels: Vec<usize> = batch.iter().map(|&ix| labels[ix]).collect();
                epoch_loss += self.train_batch(&batch_sequences, &batch_labels, learning_rate, rng)
                    * batch.len() as f32;
            }
            log::debug!(
                "epoch {}: loss {}",
                epoch,
                epoch_loss / sequences.len().max(1) as f32
            );
        }
        Ok(())
    }

    /// One gradient step on a minibatch; returns the mean loss.
    fn train_batch(
        &mut self,
        sequences: &[&Vec<usize>],
        labels: &[usize],
        learning_rate: f32,
        rng: &mut StdRng,
    ) -> f32 {
        self.zero_grads();
        let mut loss = 0.0;
        for (&sequence, label) in sequences.iter().zip(labels.iter()) {
            let pass = self.forward(sequence, true, Some(&mut *rng));
            let probabilities = softmax(&pass.logits);
            loss += -probabilities[*label].max(1e-12).ln();
            let mut d_logits = probabilities;
            d_logits[*label] -= 1.0;
            self.backward(&pass, &d_logits);
        }
        self.step_count += 1;
        let scale = 1.0 / sequences.len().max(1) as f32;
        let optimizer = self.config.optimizer;
        let step = self.step_count;
        for param in self.params_mut() {
            param.apply_update(optimizer, learning_rate, step, scale);
        }
        loss / sequences.len().max(1) as f32
    }

    /// Mean loss and accuracy on a held-out set.
    pub fn evaluate(&self, sequences: &[Vec<usize>], labels: &[usize]) -> (f32, f32) {
        if sequences.is_empty() {
            return (0.0, 0.0);
        }
        let mut loss = 0.0;
        let mut correct = 0;
        for (sequence, label) in sequences.iter().zip(labels.iter()) {
            let probabilities = self.predict_probabilities(sequence);
            loss += -probabilities[*label].max(1e-12).ln();
            if argmax(&probabilities) == *label {
                correct += 1;
            }
        }
        (
            loss / sequences.len() as f32,
            correct as f32 / sequences.len() as f32,
        )
    }

    pub fn predict(&self, sequence: &[usize]) -> usize {
        argmax(&self.predict_probabilities(sequence))
    }

    /// Probability vector over labels (softmax of the logits).
    pub fn predict_probabilities(&self, sequence: &[usize]) -> Array1<f32> {
        let pass = self.forward(sequence, false, None);
        softmax(&pass.logits)
    }

    fn forward(
        &self,
        sequence: &[usize],
        training: bool,
        mut rng: Option<&mut StdRng>,
    ) -> ForwardPass {
        let embedding = self.embedding.matrix();
        let embedding_dim = self.config.embedding_dim;
        let mut embedded = Array2::<f32>::zeros((sequence.len(), embedding_dim));
        for (t, &token) in sequence.iter().enumerate() {
            let token = token.min(self.vocab_size - 1);
            embedded.row_mut(t).assign(&embedding.row(token));
        }

        let conv1 = conv_forward(
            &embedded,
            &self.conv1_weights.matrix(),
            &self.conv1_bias.vector(),
            self.config.kernel_size,
            self.config.strides,
            self.config.padding,
            self.config.activation,
        );
        let pool1 = pool_forward(&conv1.activated, self.config.strides, self.config.padding);
        let conv2 = conv_forward(
            &pool1.output,
            &self.conv2_weights.matrix(),
            &self.conv2_bias.vector(),
            self.config.kernel_size,
            self.config.strides,
            self.config.padding,
            self.config.activation,
        );
        let pool2 = pool_forward(&conv2.activated, self.config.strides, self.config.padding);

        let (global_output, global_argmax) = global_max_pool(&pool2.output);

        let dense1 = dense_forward(
            &global_output,
            &self.dense1_weights.matrix(),
            &self.dense1_bias.vector(),
            self.config.activation,
        );
        let drop1 = dropout_mask(
            dense1.output.len(),
            self.config.dropout_rate,
            training,
            rng.as_deref_mut(),
        );
        let dropped1 = apply_mask(&dense1.output, &drop1);
        let dense2 = dense_forward(
            &dropped1,
            &self.dense2_weights.matrix(),
            &self.dense2_bias.vector(),
            self.config.activation,
        );
        let drop2 = dropout_mask(
            dense2.output.len(),
            self.config.dropout_rate,
            training,
            rng.as_deref_mut(),
        );
        let dropped2 = apply_mask(&dense2.output, &drop2);
        let output = dense_forward(
            &dropped2,
            &self.output_weights.matrix(),
            &self.output_bias.vector(),
            Activation::Linear,
        );

        ForwardPass {
            sequence: sequence.to_vec(),
            conv1,
            pool1,
            conv2,
            pool2,
            global_argmax,
            global_output,
            dense1,
            drop1,
            dense2,
            drop2,
            logits: output.output,
        }
    }

    fn backward(&mut self, pass: &ForwardPass, d_logits: &Array1<f32>) {
        // output layer (linear)
        let dropped2 = apply_mask(&pass.dense2.output, &pass.drop2);
        accumulate_dense(
            &mut self.output_weights,
            &mut self.output_bias,
            &dropped2,
            d_logits,
        );
        let mut d_dense2 = self.output_weights_dot(d_logits);
        if let Some(mask) = &pass.drop2 {
            d_dense2 *= mask;
        }

        // dense 2
        let d_pre2 = &d_dense2
            * &activation_derivative(
                &pass.dense2.pre_activation,
                &pass.dense2.output,
                self.config.activation,
            );
        let dropped1 = apply_mask(&pass.dense1.output, &pass.drop1);
        accumulate_dense(
            &mut self.dense2_weights,
            &mut self.dense2_bias,
            &dropped1,
            &d_pre2,
        );
        let mut d_dense1 = matrix_vector(&self.dense2_weights.matrix(), &d_pre2);
        if let Some(mask) = &pass.drop1 {
            d_dense1 *= mask;
        }

        // dense 1
        let d_pre1 = &d_dense1
            * &activation_derivative(
                &pass.dense1.pre_activation,
                &pass.dense1.output,
                self.config.activation,
            );
        accumulate_dense(
            &mut self.dense1_weights,
            &mut self.dense1_bias,
            &pass.global_output,
            &d_pre1,
        );
        let d_global = matrix_vector(&self.dense1_weights.matrix(), &d_pre1);

        // global max pool
        let mut d_pool2 = Array2::<f32>::zeros(pass.pool2.output.raw_dim());
        for (channel, source_row) in pass.global_argmax.iter().enumerate() {
            if let Some(row) = source_row {
                d_pool2[[*row, channel]] += d_global[channel];
            }
        }

        // pool 2 + conv 2
        let d_conv2 = pool_backward(&pass.pool2, &d_pool2, self.config.strides);
        let d_pool1 = conv_backward(
            &pass.conv2,
            &mut self.conv2_weights,
            &mut self.conv2_bias,
            &d_conv2,
            self.config.kernel_size,
            self.config.strides,
            self.config.activation,
            self.config.filters,
        );

        // pool 1 + conv 1
        let d_conv1 = pool_backward(&pass.pool1, &d_pool1, self.config.strides);
        let d_embedded = conv_backward(
            &pass.conv1,
            &mut self.conv1_weights,
            &mut self.conv1_bias,
            &d_conv1,
            self.config.kernel_size,
            self.config.strides,
            self.config.activation,
            self.config.embedding_dim,
        );

        // embedding rows
        let mut embedding_grad = self
            .embedding
            .grad
            .view_mut()
            .into_dimensionality::<Ix2>()
            .unwrap();
        for (t, &token) in pass.sequence.iter().enumerate() {
            let token = token.min(self.vocab_size - 1);
            let mut row = embedding_grad.row_mut(token);
            row += &d_embedded.row(t);
        }
    }

    fn output_weights_dot(&self, d_logits: &Array1<f32>) -> Array1<f32> {
        matrix_vector(&self.output_weights.matrix(), d_logits)
    }

    fn zero_grads(&mut self) {
        for param in self.params_mut() {
            param.zero_grad();
        }
    }

    fn params_mut(&mut self) -> Vec<&mut Param> {
        vec![
            &mut self.embedding,
            &mut self.conv1_weights,
            &mut self.conv1_bias,
            &mut self.conv2_weights,
            &mut self.conv2_bias,
            &mut self.dense1_weights,
            &mut self.dense1_bias,
            &mut self.dense2_weights,
            &mut self.dense2_bias,
            &mut self.output_weights,
            &mut self.output_bias,
        ]
    }

    pub fn to_model(&self) -> ClassifierModel {
        ClassifierModel {
            hyperparameters: self.config.clone(),
            vocab_size: self.vocab_size,
            num_labels: self.num_labels,
            embedding: to_nested(&self.embedding.matrix()),
            conv1_weights: to_nested(&self.conv1_weights.matrix()),
            conv1_bias: self.conv1_bias.vector().to_vec(),
            conv2_weights: to_nested(&self.conv2_weights.matrix()),
            conv2_bias: self.conv2_bias.vector().to_vec(),
            dense1_weights: to_nested(&self.dense1_weights.matrix()),
            dense1_bias: self.dense1_bias.vector().to_vec(),
            dense2_weights: to_nested(&self.dense2_weights.matrix()),
            dense2_bias: self.dense2_bias.vector().to_vec(),
            output_weights: to_nested(&self.output_weights.matrix()),
            output_bias: self.output_bias.vector().to_vec(),
        }
    }

    pub fn from_model(model: ClassifierModel) -> Result<Self> {
        Ok(Self {
            config: model.hyperparameters.clone(),
            vocab_size: model.vocab_size,
            num_labels: model.num_labels,
            embedding: Param::new(from_nested(model.embedding)?),
            conv1_weights: Param::new(from_nested(model.conv1_weights)?),
            conv1_bias: Param::new(from_vec(model.conv1_bias)),
            conv2_weights: Param::new(from_nested(model.conv2_weights)?),
            conv2_bias: Param::new(from_vec(model.conv2_bias)),
            dense1_weights: Param::new(from_nested(model.dense1_weights)?),
            dense1_bias: Param::new(from_vec(model.dense1_bias)),
            dense2_weights: Param::new(from_nested(model.dense2_weights)?),
            dense2_bias: Param::new(from_vec(model.dense2_bias)),
            output_weights: Param::new(from_nested(model.output_weights)?),
            output_bias: Param::new(from_vec(model.output_bias)),
            step_count: 0,
        })
    }
}

fn uniform_init(rows: usize, cols: usize, limit: f32, rng: &mut StdRng) -> ArrayD<f32> {
    ArrayD::from_shape_fn(IxDyn(&[rows, cols]), |_| rng.gen_range(-limit..limit))
}

fn glorot_init(rows: usize, cols: usize, rng: &mut StdRng) -> ArrayD<f32> {
    let limit = (6.0 / (rows + cols) as f32).sqrt();
    uniform_init(rows, cols, limit, rng)
}

fn to_nested(matrix: &ArrayView2<f32>) -> Vec<Vec<f32>> {
    matrix.rows().into_iter().map(|row| row.to_vec()).collect()
}

fn from_nested(rows: Vec<Vec<f32>>) -> Result<ArrayD<f32>> {
    let num_rows = rows.len();
    let num_cols = rows.first().map(|row| row.len()).unwrap_or(0);
    if rows.iter().any(|row| row.len() != num_cols) {
        return Err(
            JobQueueNluError::InternalError("Ragged weight matrix in model".to_string()).into(),
        );
    }
    let flat: Vec<f32> = rows.into_iter().flatten().collect();
    Ok(Array2::from_shape_vec((num_rows, num_cols), flat)
        .map_err(|e| JobQueueNluError::InternalError(e.to_string()))?
        .into_dyn())
}

fn from_vec(values: Vec<f32>) -> ArrayD<f32> {
    Array1::from(values).into_dyn()
}

fn conv_output_len(input_len: usize, kernel: usize, stride: usize, padding: Padding) -> usize {
    match padding {
        Padding::Same => (input_len + stride - 1) / stride,
        Padding::Valid => {
            if input_len >= kernel {
                (input_len - kernel) / stride + 1
            } else {
                0
            }
        }
    }
}

fn conv_forward(
    input: &Array2<f32>,
    weights: &ArrayView2<f32>,
    bias: &ArrayView1<f32>,
    kernel: usize,
    stride: usize,
    padding: Padding,
    activation: Activation,
) -> ConvCache {
    let input_len = input.nrows();
    let channels = input.ncols();
    let output_len = conv_output_len(input_len, kernel, stride, padding);
    let pad_left = match padding {
        Padding::Same => {
            let needed = (output_len.saturating_sub(1)) * stride + kernel;
            needed.saturating_sub(input_len) / 2
        }
        Padding::Valid => 0,
    };

    let mut columns = Array2::<f32>::zeros((output_len, kernel * channels));
    for t in 0..output_len {
        for j in 0..kernel {
            let source = (t * stride + j) as isize - pad_left as isize;
            if source >= 0 && (source as usize) < input_len {
                let source = source as usize;
                columns
                    .slice_mut(s![t, j * channels..(j + 1) * channels])
                    .assign(&input.row(source));
            }
        }
    }

    let pre_activation = &columns.dot(weights) + bias;
    let activated = apply_activation(&pre_activation, activation);
    ConvCache {
        columns,
        pre_activation,
        activated,
        input_len,
        pad_left,
    }
}

#[allow(clippy::too_many_arguments)]
fn conv_backward(
    cache: &ConvCache,
    weights: &mut Param,
    bias: &mut Param,
    d_activated: &Array2<f32>,
    kernel: usize,
    stride: usize,
    activation: Activation,
    input_channels: usize,
) -> Array2<f32> {
    let d_pre = d_activated
        * &activation_derivative_2d(&cache.pre_activation, &cache.activated, activation);

    let d_weights = cache.columns.t().dot(&d_pre);
    let d_bias = d_pre.sum_axis(Axis(0));
    add_assign_dyn(&mut weights.grad, &d_weights.into_dyn());
    add_assign_dyn(&mut bias.grad, &d_bias.into_dyn());

    let weights_view = weights.matrix();
    let d_columns = d_pre.dot(&weights_view.t());
    let mut d_input = Array2::<f32>::zeros((cache.input_len, input_channels));
    for t in 0..d_columns.nrows() {
        for j in 0..kernel {
            let source = (t * stride + j) as isize - cache.pad_left as isize;
            if source >= 0 && (source as usize) < cache.input_len {
                let source = source as usize;
                let mut row = d_input.row_mut(source);
                row += &d_columns.slice(s![t, j * input_channels..(j + 1) * input_channels]);
            }
        }
    }
    d_input
}

fn pool_forward(input: &Array2<f32>, stride: usize, padding: Padding) -> PoolCache {
    let input_len = input.nrows();
    let channels = input.ncols();
    let output_len = match padding {
        Padding::Same => (input_len + stride - 1) / stride,
        Padding::Valid => {
            if input_len >= POOL_SIZE {
                (input_len - POOL_SIZE) / stride + 1
            } else {
                0
            }
        }
    };
    let mut output = Array2::<f32>::zeros((output_len, channels));
    let mut argmax = Array2::<usize>::zeros((output_len, channels));
    for t in 0..output_len {
        let window_start = t * stride;
        let window_end = (window_start + POOL_SIZE).min(input_len);
        for c in 0..channels {
            let mut best_row = window_start;
            let mut best = f32::NEG_INFINITY;
            for row in window_start..window_end {
                if input[[row, c]] > best {
                    best = input[[row, c]];
                    best_row = row;
                }
            }
            output[[t, c]] = best;
            argmax[[t, c]] = best_row;
        }
    }
    PoolCache {
        argmax,
        output,
        input_len,
    }
}

fn pool_backward(cache: &PoolCache, d_output: &Array2<f32>, _stride: usize) -> Array2<f32> {
    let channels = d_output.ncols();
    let mut d_input = Array2::<f32>::zeros((cache.input_len, channels));
    for t in 0..d_output.nrows() {
        for c in 0..channels {
            d_input[[cache.argmax[[t, c]], c]] += d_output[[t, c]];
        }
    }
    d_input
}

fn global_max_pool(input: &Array2<f32>) -> (Array1<f32>, Vec<Option<usize>>) {
    let channels = input.ncols();
    let mut output = Array1::<f32>::zeros(channels);
    let mut argmax = vec![None; channels];
    for c in 0..channels {
        let mut best = f32::NEG_INFINITY;
        for row in 0..input.nrows() {
            if input[[row, c]] > best {
                best = input[[row, c]];
                argmax[c] = Some(row);
            }
        }
        output[c] = if argmax[c].is_some() { best } else { 0.0 };
    }
    (output, argmax)
}

fn dense_forward(
    input: &Array1<f32>,
    weights: &ArrayView2<f32>,
    bias: &ArrayView1<f32>,
    activation: Activation,
) -> DenseCache {
    let pre_activation = &input.dot(weights) + bias;
    let output = apply_activation_1d(&pre_activation, activation);
    DenseCache {
        pre_activation,
        output,
    }
}

fn accumulate_dense(weights: &mut Param, bias: &mut Param, input: &Array1<f32>, d_pre: &Array1<f32>) {
    let outer = input
        .view()
        .insert_axis(Axis(1))
        .dot(&d_pre.view().insert_axis(Axis(0)));
    add_assign_dyn(&mut weights.grad, &outer.into_dyn());
    add_assign_dyn(&mut bias.grad, &d_pre.clone().into_dyn());
}

fn add_assign_dyn(target: &mut ArrayD<f32>, delta: &ArrayD<f32>) {
    ndarray::Zip::from(target)
        .and(delta)
        .for_each(|t, d| *t += d);
}

fn matrix_vector(matrix: &ArrayView2<f32>, vector: &Array1<f32>) -> Array1<f32> {
    matrix.dot(vector)
}

/// Inverted dropout: kept units are scaled by `1/(1-rate)` so inference
/// needs no rescaling. `None` outside training.
fn dropout_mask(
    len: usize,
    rate: f32,
    training: bool,
    rng: Option<&mut StdRng>,
) -> Option<Array1<f32>> {
    match rng {
        Some(rng) if training && rate > 0.0 => Some(Array1::from_shape_fn(len, |_| {
            if rng.gen::<f32>() < rate {
                0.0
            } else {
                1.0 / (1.0 - rate)
            }
        })),
        _ => None,
    }
}

fn apply_mask(output: &Array1<f32>, mask: &Option<Array1<f32>>) -> Array1<f32> {
    match mask {
        Some(mask) => output * mask,
        None => output.clone(),
    }
}

fn apply_activation(input: &Array2<f32>, activation: Activation) -> Array2<f32> {
    input.mapv(|v| activate(v, activation))
}

fn apply_activation_1d(input: &Array1<f32>, activation: Activation) -> Array1<f32> {
    input.mapv(|v| activate(v, activation))
}

fn activate(value: f32, activation: Activation) -> f32 {
    match activation {
        Activation::Relu => value.max(0.0),
        Activation::Tanh => value.tanh(),
        Activation::Sigmoid => 1.0 / (1.0 + (-value).exp()),
        Activation::Linear | Activation::Softmax => value,
    }
}

fn activation_derivative(
    pre_activation: &Array1<f32>,
    output: &Array1<f32>,
    activation: Activation,
) -> Array1<f32> {
    match activation {
        Activation::Relu => pre_activation.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
        Activation::Tanh => output.mapv(|a| 1.0 - a * a),
        Activation::Sigmoid => output.mapv(|a| a * (1.0 - a)),
        Activation::Linear | Activation::Softmax => Array1::ones(output.len()),
    }
}

fn activation_derivative_2d(
    pre_activation: &Array2<f32>,
    output: &Array2<f32>,
    activation: Activation,
) -> Array2<f32> {
    match activation {
        Activation::Relu => pre_activation.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
        Activation::Tanh => output.mapv(|a| 1.0 - a * a),
        Activation::Sigmoid => output.mapv(|a| a * (1.0 - a)),
        Activation::Linear | Activation::Softmax => Array2::ones(output.raw_dim()),
    }
}

pub fn softmax(logits: &Array1<f32>) -> Array1<f32> {
    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps = logits.mapv(|v| (v - max).exp());
    let sum = exps.sum();
    exps / sum
}

pub fn argmax(values: &Array1<f32>) -> usize {
    values
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(ix, _)| ix)
        .unwrap_or(0)
}
